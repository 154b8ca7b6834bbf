pub(crate) mod state_log;
