pub mod config;
pub mod day_plan_repository;
pub mod error;
pub mod event_mapper;
pub mod google_calendar_client;
pub mod storage;
