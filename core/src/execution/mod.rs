//! Pipeline execution
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

pub mod orchestrator;

pub use self::orchestrator::{
    merge_fallback, run_certification, FallbackReport, Orchestrator, Outcome, Phase,
};
