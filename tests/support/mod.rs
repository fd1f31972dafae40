#![allow(dead_code)]

pub mod churnsight_env;
pub mod fixtures;
