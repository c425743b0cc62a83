//! Specialist configuration: categories and iteration budgets.

mod category;
mod iteration;

pub use category::{
    CategoryProvider, SpecialistCategory, SpecialistDefinition, SpecialistRegistry,
    StaticCategoryProvider,
};
pub use iteration::{
    CategoryDefaults, IterationConfig, IterationConfigPatch, IterationLimit,
    IterationLimitResolver, SpecialistIterationManager,
};
