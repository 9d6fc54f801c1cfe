//! Unit test suite entry point.

mod cli_command_parse_tests;
mod config_tests;
mod hash_embed_tests;
