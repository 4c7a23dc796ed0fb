use crate::api::{
    ApiResponse, HistoryResponse, PingResponse, PortScanResponse, ProbeRequest, ResponseBody,
    TracerouteResponse,
};
use crate::config::Settings;
use crate::error::VantageError;
use crate::outcome::{Outcome, ProbeKind, RecordId, UserId};
use crate::ping::Pinger;
use crate::platform::Platform;
use crate::portscan::PortScanner;
use crate::session::SessionProvider;
use crate::store::ResultRecorder;
use crate::target::ProbeTarget;
use crate::traceroute::Tracer;
use log::{debug, error, info};
use std::sync::Arc;
use tokio::sync::{Semaphore, SemaphorePermit};

/// Everything a request handler needs, built once at startup.
pub struct ProbeContext {
    pub recorder: Arc<dyn ResultRecorder>,
    pub session: Arc<dyn SessionProvider>,
    pub pinger: Pinger,
    pub scanner: PortScanner,
    pub tracer: Tracer,
    pub max_concurrent_probes: usize,
    pub history_limit: usize,
}

impl ProbeContext {
    pub fn from_settings(
        settings: &Settings,
        platform: Platform,
        recorder: Arc<dyn ResultRecorder>,
        session: Arc<dyn SessionProvider>,
    ) -> Self {
        Self {
            recorder,
            session,
            pinger: Pinger::new(settings.ping.clone(), platform),
            scanner: PortScanner::new(settings.port_scan.clone()),
            tracer: Tracer::new(settings.traceroute.clone(), platform),
            max_concurrent_probes: settings.service.max_concurrent_probes,
            history_limit: settings.service.history_limit,
        }
    }
}

/// Runs probe requests end to end.
///
/// Auth and input checks come first and short-circuit. Ping and
/// traceroute attempts are always recorded, even when they fail; a port
/// scan whose host does not resolve is not. A recorder failure is logged
/// and never changes the response.
pub struct Orchestrator {
    ctx: ProbeContext,
    permits: Semaphore,
}

impl Orchestrator {
    pub fn new(ctx: ProbeContext) -> Self {
        let permits = Semaphore::new(ctx.max_concurrent_probes.max(1));
        Self { ctx, permits }
    }

    pub fn context(&self) -> &ProbeContext {
        &self.ctx
    }

    /// Dispatches a JSON request body to the probe of the given kind.
    pub async fn handle(&self, kind: ProbeKind, body: &str) -> ApiResponse {
        let req = match ProbeRequest::from_json(body) {
            Ok(req) => req,
            Err(e) => {
                if let Err(auth) = self.authorize() {
                    return ApiResponse::error(None, &auth);
                }
                return ApiResponse::error(None, &e);
            }
        };
        match kind {
            ProbeKind::Ping => self.ping(&req).await,
            ProbeKind::PortScan => self.port_scan(&req).await,
            ProbeKind::Traceroute => self.traceroute(&req).await,
        }
    }

    pub async fn ping(&self, req: &ProbeRequest) -> ApiResponse {
        let (user, target) = match self.admit(req) {
            Ok(admitted) => admitted,
            Err(resp) => return resp,
        };

        let report = match self.permit().await {
            Ok(_permit) => self.ctx.pinger.ping(&target, user).await,
            Err(e) => return ApiResponse::error(Some(target.to_string()), &e),
        };
        let record_id = self.persist(report.outcome.clone().into()).await;

        match report.failure {
            None => ApiResponse::ok(ResponseBody::Ping(PingResponse::new(
                &report.outcome,
                record_id,
            ))),
            Some(e) => ApiResponse::failed(
                Some(target.to_string()),
                &e,
                Some(report.outcome.raw_output),
                record_id,
            ),
        }
    }

    pub async fn port_scan(&self, req: &ProbeRequest) -> ApiResponse {
        let (user, target) = match self.admit(req) {
            Ok(admitted) => admitted,
            Err(resp) => return resp,
        };
        let port = match req.port() {
            Ok(port) => port,
            Err(e) => return ApiResponse::error(Some(target.to_string()), &e),
        };

        let result = match self.permit().await {
            Ok(_permit) => self.ctx.scanner.scan(&target, port, user).await,
            Err(e) => Err(e),
        };
        let report = match result {
            Ok(report) => report,
            Err(e) => {
                info!("Port scan of {}:{} not attempted: {}", target, port, e);
                return ApiResponse::error(Some(target.to_string()), &e);
            }
        };
        let record_id = self.persist(report.outcome.clone().into()).await;

        ApiResponse::ok(ResponseBody::PortScan(PortScanResponse::new(
            &report.outcome,
            record_id,
        )))
    }

    pub async fn traceroute(&self, req: &ProbeRequest) -> ApiResponse {
        let (user, target) = match self.admit(req) {
            Ok(admitted) => admitted,
            Err(resp) => return resp,
        };

        let report = match self.permit().await {
            Ok(_permit) => self.ctx.tracer.trace(&target, user).await,
            Err(e) => return ApiResponse::error(Some(target.to_string()), &e),
        };
        let record_id = self.persist(report.outcome.clone().into()).await;

        match report.failure {
            None => ApiResponse::ok(ResponseBody::Traceroute(TracerouteResponse::new(
                &report.outcome,
                record_id,
            ))),
            Some(e) => ApiResponse::failed(
                Some(target.to_string()),
                &e,
                Some(report.outcome.raw_output),
                record_id,
            ),
        }
    }

    /// The current user's recorded outcomes, newest first.
    ///
    /// With no kind, all three kinds are merged by attempt time.
    pub async fn history(&self, kind: Option<ProbeKind>, limit: Option<usize>) -> ApiResponse {
        let user = match self.authorize() {
            Ok(user) => user,
            Err(e) => return ApiResponse::error(None, &e),
        };
        let limit = limit.unwrap_or(self.ctx.history_limit);
        let kinds = match kind {
            Some(kind) => vec![kind],
            None => vec![ProbeKind::Ping, ProbeKind::PortScan, ProbeKind::Traceroute],
        };

        let recorder = Arc::clone(&self.ctx.recorder);
        let fetched = tokio::task::spawn_blocking(move || {
            let mut entries = Vec::new();
            for kind in kinds {
                entries.extend(recorder.history(user, kind, limit)?);
            }
            Ok::<_, VantageError>(entries)
        })
        .await
        .unwrap_or_else(|e| Err(VantageError::Persistence(e.to_string())));

        match fetched {
            Ok(mut entries) => {
                entries.sort_by(|a, b| b.outcome.attempted_at().cmp(&a.outcome.attempted_at()));
                entries.truncate(limit);
                ApiResponse::ok(ResponseBody::History(HistoryResponse { entries }))
            }
            Err(e) => {
                error!("Failed to read history for user {}: {}", user, e);
                ApiResponse::error(None, &e)
            }
        }
    }

    fn authorize(&self) -> Result<UserId, VantageError> {
        self.ctx
            .session
            .current_user_id()
            .ok_or(VantageError::Unauthorized)
    }

    /// Session check, then host validation.
    fn admit(&self, req: &ProbeRequest) -> Result<(UserId, ProbeTarget), ApiResponse> {
        let user = self.authorize().map_err(|e| ApiResponse::error(None, &e))?;
        let raw = req.host().map_err(|e| ApiResponse::error(None, &e))?;
        let target = ProbeTarget::parse(raw).map_err(|rejected| {
            debug!("Rejected host {:?}: {}", raw, rejected);
            ApiResponse::error(Some(raw.to_string()), &rejected.into())
        })?;
        Ok((user, target))
    }

    async fn permit(&self) -> Result<SemaphorePermit<'_>, VantageError> {
        self.permits
            .acquire()
            .await
            .map_err(|e| VantageError::Execution(e.to_string()))
    }

    async fn persist(&self, outcome: Outcome) -> Option<RecordId> {
        let recorder = Arc::clone(&self.ctx.recorder);
        let kind = outcome.kind();
        match tokio::task::spawn_blocking(move || recorder.record(&outcome)).await {
            Ok(Ok(id)) => Some(id),
            Ok(Err(e)) => {
                error!("Failed to record {} result: {}", kind, e);
                None
            }
            Err(e) => {
                error!("Recorder task for {} result failed: {}", kind, e);
                None
            }
        }
    }
}
