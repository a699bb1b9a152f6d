pub mod bootstrap;
pub mod busy_time;
pub mod commands;
pub mod day_plan_service;
pub mod logging;
