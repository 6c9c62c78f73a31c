pub mod collectors;
pub mod config;
pub mod dashboard;
pub mod gate;
pub mod history;
pub mod polling;
pub mod render;
pub mod sampler;
pub mod snapshot;

pub use dashboard::{Dashboard, DashboardOptions, DashboardView, Presenter};
pub use gate::{EnvironmentGate, PageLocation};
pub use snapshot::Snapshot;
