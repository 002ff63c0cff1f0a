//! Integration tests: whole matches driven through the dispatcher.

mod harness;
mod match_flow;
