//! 服务装配

use adapter_postgres::{PgConnectionProvider, check_connection};
use config::AppConfig;
use errors::AppResult;
use telemetry::PrometheusHandle;
use tracing::info;

use crate::application::ProductService;
use crate::error::BootstrapError;
use crate::infrastructure::persistence::{
    MemoryBarcodeStore, MemoryDatabase, MemoryProductStore, PgBarcodeStore, PgProductStore,
    run_migrations,
};

/// PostgreSQL 存储上的商品服务
pub type PgProductService = ProductService<PgConnectionProvider, PgProductStore, PgBarcodeStore>;

/// 内存存储上的商品服务
pub type MemoryProductService = ProductService<MemoryDatabase, MemoryProductStore, MemoryBarcodeStore>;

/// 连接数据库并装配服务，按配置执行迁移
pub async fn postgres_service(config: &AppConfig) -> AppResult<PgProductService> {
    let provider = PgConnectionProvider::from_config(&config.database).await?;
    check_connection(provider.pool()).await?;

    if config.database.run_migrations {
        run_migrations(provider.pool()).await?;
    }

    info!(
        app = %config.app_name,
        env = %config.app_env,
        isolation_level = provider.isolation_level().as_sql(),
        "Product service ready"
    );
    Ok(ProductService::new(provider, PgProductStore, PgBarcodeStore))
}

pub fn memory_service(db: MemoryDatabase) -> MemoryProductService {
    ProductService::new(db, MemoryProductStore, MemoryBarcodeStore)
}

/// 加载配置、初始化遥测并装配 PostgreSQL 服务
///
/// 返回的 [`PrometheusHandle`] 仅在启用 metrics 时存在，由宿主负责暴露。
pub async fn start(
    config_dir: &str,
) -> Result<(PgProductService, Option<PrometheusHandle>), BootstrapError> {
    let config = AppConfig::load(config_dir)?;
    let metrics = telemetry::init(&config.telemetry)?;
    let service = postgres_service(&config).await?;
    Ok((service, metrics))
}
