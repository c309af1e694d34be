mod closed_loop;
mod config_loading;
mod reference_scenarios;
mod system_lifecycle;
