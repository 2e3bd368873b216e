//! depgate - Rule-driven dependency version resolver library
//!
//! This library evaluates dependencies declared by any ecosystem against
//! user-defined rules:
//! - Installed versions come from lock files (`extract`)
//! - Available versions come from shell command templates (`exec`)
//! - Target versions are chosen by constraint and bump policy (`resolver`)
//! - Updates run per package or per atomic group (`group`)

pub mod classify;
pub mod cli;
pub mod config;
pub mod context;
pub mod domain;
pub mod error;
pub mod exec;
pub mod extract;
pub mod group;
pub mod input;
pub mod orchestrator;
pub mod output;
pub mod preflight;
pub mod progress;
pub mod resolver;
pub mod supervision;
pub mod systemtest;
