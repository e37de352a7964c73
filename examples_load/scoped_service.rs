use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing_log_extended::context::{self, LogicalContext};
use tracing_log_extended::host::TracingHost;
use tracing_log_extended::init::{init_tracing_with_config, TracingConfig};
use tracing_log_extended::mapper::EventMapper;
use tracing_log_extended::{Exception, Level, ScopeConfiguration, StructuredLogger};

#[derive(Serialize)]
struct Job {
    job_id: u64,
    queue: &'static str,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing_with_config(TracingConfig {
        filter: "trace".to_string(),
        ..TracingConfig::default()
    })?;

    let mapper = EventMapper::new().with_attribute("Application", "scoped_service");
    let logger = StructuredLogger::new("worker", Arc::new(TracingHost::new(mapper)));
    let config = ScopeConfiguration {
        include_properties: true,
        ..ScopeConfiguration::default()
    };

    let n: u64 = 8;
    let start = Instant::now();

    LogicalContext::root()
        .scope(async {
            let _batch = logger.begin_scope("batch", None::<&()>, Some(config))?;

            let mut handles = Vec::new();
            for job_id in 0..n {
                let logger = logger.clone();
                handles.push(context::spawn(async move {
                    let job = Job {
                        job_id,
                        queue: "default",
                    };
                    let _scope = logger.begin_scope("job", Some(&job), Some(config))?;
                    logger.info("processing");

                    if job_id % 4 == 3 {
                        let failure = Exception::aggregate(
                            "job steps failed",
                            vec![
                                Exception::new("worker::FetchError", "upstream timed out"),
                                Exception::capture("worker::ParseError", "unexpected end of input"),
                            ],
                        );
                        logger.log_extended(Level::Error, "job failed", Some(&job), Some(Arc::new(failure)));
                    }
                    Ok::<_, tracing_log_extended::error::ScopeError>(())
                }));
            }

            for handle in handles {
                handle.await??;
            }
            Ok::<_, Box<dyn std::error::Error>>(())
        })
        .await?;

    let elapsed = start.elapsed();
    println!("scoped_service: ran {} jobs in {:?}", n, elapsed);
    Ok(())
}
