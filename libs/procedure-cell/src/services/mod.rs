pub mod procedure;
pub mod templates;
pub mod tracker;

pub use procedure::ProcedureService;
pub use templates::default_steps;
