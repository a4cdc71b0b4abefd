// Scheduler module: discretisation, solver binding and the build/solve engine

pub mod binding;
pub mod engine;
pub mod grid;

pub use binding::{ModelBinding, SolverHandles};
pub use engine::{Scheduler, SchedulerState, SolveReport};
pub use grid::TimeGrid;
