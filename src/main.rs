use std::sync::Arc;
use studio_billing::{api, create_pool, db, AppConfig, BillingService};
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志 - 使用本地时间格式
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_target(true)
        .with_level(true)
        .init();

    // 加载配置
    let config = AppConfig::from_env()?;
    info!(
        "Starting server on {}:{} (payment terms {} days)",
        config.server.host, config.server.port, config.billing.payment_terms_days
    );

    // 创建数据库连接池
    let pool = create_pool(&config.database.url, config.database.max_connections).await?;
    info!("Database pool created");

    if config.database.run_migrations {
        db::run_migrations(&pool).await?;
        info!("Database migrations applied");
    }

    let service = Arc::new(BillingService::new(pool, config.billing.payment_terms_days));
    let app = api::router(service);

    // 启动服务器
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server listening on {}", addr);
    info!("API Endpoints:");
    info!("  POST /api/quotes/:id/invoices     - create invoice from quote");
    info!("  GET  /api/quotes/:id/billing      - billing summary");
    info!("  GET  /api/quotes/:id/preview      - quote totals preview");
    info!("  GET  /api/quotes/:id/ledger.csv   - invoice ledger export");
    info!("  POST /api/quotes/:id/approve      - client approval");
    info!("  POST /api/invoices/:id/status     - status transition");
    info!("  POST /api/invoices/:id/payments   - record payment");
    info!("  POST /api/invoices/:id/cancel     - cancel invoice");
    info!("  POST /api/invoices/overdue-sweep  - mark overdue invoices");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
