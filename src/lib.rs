use crate::api::scenario_dto::ScenarioDto;
use crate::domain::scenario::Scenario;
use crate::error::Result;
use crate::loader::parser::parse_json_file;

pub mod api;
pub mod domain;
pub mod error;
pub mod loader;
pub mod logger;

/// Loads a scenario file and builds the evaluation model from it.
pub fn load_scenario(file_path: &str) -> Result<Scenario> {
    logger::init();
    log::info!("Logger initialized. Starting scenario construction.");

    let root_dto: ScenarioDto = parse_json_file::<ScenarioDto>(file_path)?;
    log::info!("JSON file parsed successfully.");

    let scenario = Scenario::from_dto(root_dto)?;
    log::info!("Scenario for {} constructed successfully.", scenario.requirement);

    Ok(scenario)
}
