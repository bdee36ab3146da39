// Anyhow tools
#[macro_export]
macro_rules! lazy_context {
    ($expr:expr, $format:tt, $($arg:tt)*) => {
        anyhow::Context::with_context($expr, || format!($format, $($arg)*))
    };
}
