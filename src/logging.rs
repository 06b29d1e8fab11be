// macros only; no direct imports needed

#[macro_export]
macro_rules! workflow_info {
    ($ctx:expr, $($arg:tt)+) => {{
        ::tracing::info!(
            workflow_id = %$ctx.metadata().workflow_id,
            run_id = %$ctx.metadata().run_id,
            $($arg)+
        );
    }};
}

#[macro_export]
macro_rules! workflow_warn {
    ($ctx:expr, $($arg:tt)+) => {{
        ::tracing::warn!(
            workflow_id = %$ctx.metadata().workflow_id,
            run_id = %$ctx.metadata().run_id,
            $($arg)+
        );
    }};
}

#[macro_export]
macro_rules! workflow_error {
    ($ctx:expr, $($arg:tt)+) => {{
        ::tracing::error!(
            workflow_id = %$ctx.metadata().workflow_id,
            run_id = %$ctx.metadata().run_id,
            $($arg)+
        );
    }};
}
