pub mod ports;

#[cfg(test)]
pub(crate) mod mock;
