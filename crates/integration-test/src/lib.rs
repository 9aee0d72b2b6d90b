#[cfg(test)]
mod test_setup;
