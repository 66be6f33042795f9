pub mod analyze;
pub mod health;
pub mod market;

#[cfg(test)]
pub(crate) mod test_support;
