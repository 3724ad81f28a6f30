// Document API: request models, the blocking generation pipeline and its handlers.
// Layout and rendering are CPU-bound and always run via tokio::task::spawn_blocking.

pub mod generator;
pub mod handlers;
