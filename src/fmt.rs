//! Logging shims.
//!
//! With the `log` feature these forward to the `log` facade. Without it they
//! expand to nothing, so no formatting code ends up inside the bit loops.

#![macro_use]
#![allow(unused_macros)]

macro_rules! trace {
    ($($arg:tt)*) => {{
        #[cfg(feature = "log")]
        {
            ::log::trace!($($arg)*);
        }
    }};
}

macro_rules! debug {
    ($($arg:tt)*) => {{
        #[cfg(feature = "log")]
        {
            ::log::debug!($($arg)*);
        }
    }};
}

macro_rules! warn {
    ($($arg:tt)*) => {{
        #[cfg(feature = "log")]
        {
            ::log::warn!($($arg)*);
        }
    }};
}
