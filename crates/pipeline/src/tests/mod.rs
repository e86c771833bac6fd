//! Behavioural tests for the engine and the query pipeline.

mod fakes;
