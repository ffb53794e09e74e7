//! Static `action name -> Controller method` dispatch table. Keymap actions
//! are resolved against this table once, at startup, rather than through
//! runtime reflection; `validate_config` lets the binary reject an unknown
//! action name before the daemon starts serving requests.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::Controller;

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
pub type KeyAction = fn(Arc<Controller>, Vec<String>) -> BoxFuture;

const KNOWN_ACTIONS: &[&str] = &[
    "start",
    "stop",
    "toggle",
    "toggle_noninteractive",
    "switch",
    "switchto",
    "switchbetween",
    "set_next",
    "set_display",
    "quit",
    "poweroff",
    "yavdr_compat_poweroff",
];

/// Returns `false` if `action` does not name a registered Controller method.
pub fn is_known_action(action: &str) -> bool {
    KNOWN_ACTIONS.contains(&action)
}

pub fn lookup(action: &str) -> Option<KeyAction> {
    let f: KeyAction = match action {
        "start" => |c, _args| Box::pin(async move { drop(c.start().await) }),
        "stop" => |c, _args| Box::pin(async move { drop(c.stop(true).await) }),
        "toggle" => |c, _args| Box::pin(async move { drop(c.toggle(true).await) }),
        "toggle_noninteractive" => {
            |c, _args| Box::pin(async move { drop(c.toggle(false).await) })
        }
        "switch" => |c, _args| Box::pin(async move { drop(c.switch().await) }),
        "switchto" => |c, args| {
            Box::pin(async move {
                if let Some(name) = args.first() {
                    drop(c.switchto(name).await);
                }
            })
        },
        "switchbetween" => |c, args| {
            Box::pin(async move {
                if let (Some(a), Some(b)) = (args.first(), args.get(1)) {
                    drop(c.switchbetween(a, b).await);
                }
            })
        },
        "set_next" => |c, args| {
            Box::pin(async move {
                if let Some(name) = args.first() {
                    drop(c.set_next(name).await);
                }
            })
        },
        "set_display" => |c, args| {
            Box::pin(async move {
                if let Some(display) = args.first() {
                    drop(c.set_display(display).await);
                }
            })
        },
        "quit" => |c, _args| Box::pin(async move { drop(c.quit().await) }),
        "poweroff" => |c, _args| Box::pin(async move { c.poweroff(false).await }),
        "yavdr_compat_poweroff" => {
            |c, _args| Box::pin(async move { c.yavdr_compat_poweroff().await })
        }
        _ => return None,
    };
    Some(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_actions_resolve() {
        for action in KNOWN_ACTIONS {
            assert!(lookup(action).is_some(), "{action} should resolve");
        }
    }

    #[test]
    fn unknown_action_is_rejected() {
        assert!(!is_known_action("do_a_barrel_roll"));
        assert!(lookup("do_a_barrel_roll").is_none());
    }
}
