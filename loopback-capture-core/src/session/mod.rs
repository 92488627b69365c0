pub mod capture_session;

#[cfg(test)]
pub(crate) mod scripted_engine;
