pub mod checkin;
pub mod config;
pub mod contact;
pub mod data;
pub mod device;
pub mod engine;
pub mod pair;
pub mod plan;
pub mod profile;
pub mod relationship;
pub mod schedule;
pub mod user;
