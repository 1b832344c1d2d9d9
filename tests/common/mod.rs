pub(crate) mod constants;
pub(crate) mod test_engine;
