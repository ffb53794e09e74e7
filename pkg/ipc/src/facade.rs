use async_trait::async_trait;

/// Everything the public D-Bus interface needs from the Controller. Kept as a
/// trait here (rather than depending on `pkg-controller` directly) so the
/// dependency edge runs controller -> ipc, not the other way around; the
/// binary wires a concrete `Arc<dyn ControllerFacade>` into the object server.
#[async_trait]
pub trait ControllerFacade: Send + Sync {
    async fn start(&self) -> (bool, String);
    async fn stop(&self) -> (bool, String);
    async fn toggle(&self) -> (bool, String);
    async fn toggle_noninteractive(&self) -> (bool, String);
    async fn switch(&self) -> (bool, String);
    async fn switchto(&self, next_frontend: &str) -> bool;
    async fn switchbetween(&self, frontend_a: &str, frontend_b: &str) -> bool;
    async fn set_next(&self, next_frontend: &str) -> bool;
    async fn set_display(&self, display: &str) -> bool;
    async fn set_next_fe(&self, kind: &str, name: &str) -> bool;
    async fn quit(&self) -> bool;
    async fn shutdown_successful(&self) -> bool;
    async fn current_frontend_name(&self) -> String;
}
