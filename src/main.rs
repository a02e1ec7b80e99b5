use clap::Parser;
use cryptonow_pos::application::controller::PaymentFlowController;
use cryptonow_pos::application::monitor::MonitorOutcome;
use cryptonow_pos::config::{
    ClientConfig, DEFAULT_QR_SERVICE_URL, DEFAULT_SERVER_URL, MonitorSettings,
};
use cryptonow_pos::domain::ports::PaymentGatewayRef;
use cryptonow_pos::infrastructure::http::HttpPaymentGateway;
use cryptonow_pos::infrastructure::in_memory::InMemoryPaymentGateway;
use cryptonow_pos::interfaces::console::ConsoleRenderer;
use miette::{IntoDiagnostic, Result, miette};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Status checks before a sandbox payment reports settlement.
const SANDBOX_SETTLE_AFTER: usize = 1;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Amount to charge, e.g. 12.5
    #[arg(allow_hyphen_values = true)]
    amount: String,

    /// Merchant wallet address that receives the payment
    #[arg(long, env = "CRYPTONOW_WALLET_ADDRESS")]
    recipient: Option<String>,

    /// Coin to charge in
    #[arg(long, default_value = "USDC")]
    token: String,

    /// Base URL of the payment service
    #[arg(long, env = "CRYPTONOW_SERVER_URL", default_value = DEFAULT_SERVER_URL)]
    server_url: String,

    /// Seconds between two status checks
    #[arg(long, default_value_t = 3)]
    poll_interval_secs: u64,

    /// Seconds after creation before monitoring gives up
    #[arg(long, default_value_t = 600)]
    timeout_secs: u64,

    /// Tolerated clock skew, in seconds, between this machine and the service
    #[arg(long, default_value_t = 60)]
    grace_secs: u64,

    /// Per-request HTTP timeout in seconds
    #[arg(long, default_value_t = 15)]
    request_timeout_secs: u64,

    /// External service used to render QR codes when the server sends none
    #[arg(long, default_value = DEFAULT_QR_SERVICE_URL)]
    qr_service_url: String,

    /// Do not probe the payment service before submitting
    #[arg(long)]
    skip_probe: bool,

    /// Use an in-process payment service that settles every payment
    #[arg(long)]
    sandbox: bool,
}

impl Cli {
    fn client_config(&self) -> ClientConfig {
        ClientConfig {
            server_url: self.server_url.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            qr_service_url: self.qr_service_url.clone(),
            monitor: MonitorSettings {
                poll_interval: Duration::from_secs(self.poll_interval_secs),
                timeout: Duration::from_secs(self.timeout_secs),
                grace_window: Duration::from_secs(self.grace_secs),
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "cryptonow_pos=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let config = cli.client_config();
    config.validate().into_diagnostic()?;

    let gateway: PaymentGatewayRef = if cli.sandbox {
        info!("using sandbox payment service");
        let gateway = InMemoryPaymentGateway::new();
        gateway.settle_after(SANDBOX_SETTLE_AFTER).await;
        Arc::new(gateway)
    } else {
        info!(server_url = %config.server_url, "using payment service");
        Arc::new(HttpPaymentGateway::from_config(&config).into_diagnostic()?)
    };

    let (controller, mut events) =
        PaymentFlowController::new(gateway, config.monitor, cli.recipient.clone());

    let qr_service_url = config.qr_service_url.clone();
    let renderer = tokio::spawn(async move {
        let mut renderer = ConsoleRenderer::new(io::stdout(), &qr_service_url);
        while let Some(event) = events.recv().await {
            if let Err(e) = renderer.render(&event) {
                warn!(error = %e, "failed to render event");
                break;
            }
        }
    });

    let result = run(&controller, &cli, &config).await;

    // Closing the controller ends the event stream once everything is rendered.
    drop(controller);
    renderer.await.into_diagnostic()?;

    result
}

async fn run(controller: &PaymentFlowController, cli: &Cli, config: &ClientConfig) -> Result<()> {
    if !cli.sandbox && !cli.skip_probe && !controller.check_service().await {
        return Err(miette!(
            "CryptoNow server is not available at {}",
            config.server_url
        ));
    }

    let (attempt, handle) = controller
        .submit(&cli.amount, &cli.token)
        .await
        .into_diagnostic()?;
    info!(
        payment_id = %attempt.record.id,
        order_id = %attempt.order_id,
        "waiting for payment"
    );

    let outcome = tokio::select! {
        outcome = handle.finished() => outcome,
        _ = tokio::signal::ctrl_c() => {
            controller.cancel();
            handle.finished().await
        }
    };

    match outcome {
        MonitorOutcome::Completed(settlement) => {
            info!(signature = %settlement.signature, "payment settled");
        }
        MonitorOutcome::TimedOut => warn!("no settlement observed before the deadline"),
        MonitorOutcome::Cancelled => info!("payment monitoring cancelled"),
    }
    Ok(())
}
