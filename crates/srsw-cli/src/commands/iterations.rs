use super::AppContext;
use anyhow::Result;
use srsw_core::specialist::{IterationLimitResolver, SpecialistIterationManager};

pub fn show(ctx: &AppContext, specialist: &str) -> Result<()> {
    let manager = SpecialistIterationManager::new(ctx.config.iteration.clone());
    let limit = manager.resolve(specialist);
    let category = IterationLimitResolver::new()
        .category_of(specialist)
        .map(|category| category.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    println!("Specialist:     {}", specialist);
    println!("Category:       {}", category);
    println!("Max iterations: {}", limit.max_iterations);
    println!("Source:         {}", limit.source);
    Ok(())
}
