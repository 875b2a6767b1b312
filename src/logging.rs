//! ログ出力の初期化

use tracing_subscriber::EnvFilter;

/// fmt サブスクライバを登録する（2回目以降の呼び出しは何もしない）
///
/// `RUST_LOG` があればそれに従い、なければ `info`（`verbose` なら `debug`）。
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging(false);
        init_logging(true);
        tracing::info!("logging initialized twice");
    }
}
