//! 日志初始化：`RUST_LOG` 优先，否则使用本服务的默认过滤规则。

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// 未设置 `RUST_LOG` 时的过滤规则；`access` 为访问日志的 target。
const DEFAULT_FILTER: &str = "warn,localweb=info,tower_http=info,access=info";

/// 初始化 tracing 日志订阅。
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(default_filter())
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

#[cfg(test)]
mod tests {
    use super::DEFAULT_FILTER;
    use tracing_subscriber::EnvFilter;

    #[test]
    fn default_filter_parses() {
        let filter = EnvFilter::try_new(DEFAULT_FILTER).expect("filter");
        let rendered = filter.to_string();
        assert!(rendered.contains("localweb=info"));
        assert!(rendered.contains("access=info"));
    }
}
