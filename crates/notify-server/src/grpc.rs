//! The tonic service implementation: binds the RPC surface (§6) onto the
//! Publisher/listing/cancellation entry points in `notify-publisher`.
//! Startup wiring mirrors `rustpress-server/src/main.rs::run_app`'s
//! config -> pool -> state -> serve sequencing; this module is the
//! `state`-equivalent plus the transport glue the teacher's axum routes
//! provide for HTTP.

use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::Stream;
use notify_core::cipher::AesGcmCipher;
use notify_database::Repository;
use notify_publisher::{
    cancel_scheduled_by_message_id, list_status_with_paging, ListStatusWithPagingRequest as CoreListRequest, PageRequest as CorePageRequest,
    Publisher, SendMailRequest as CoreSendMailRequest, SendSmsRequest as CoreSendSmsRequest,
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status, Streaming};

use crate::error::to_status;
use crate::notify_proto::notify_server::Notify;
use crate::notify_proto::{
    CancelScheduledByMessageIdRequest, ListStatusWithPagingRequest, ListStatusWithPagingResponse, PagingResult, SendMailRequest, SendResponse,
    SendSmsRequest, Target,
};

pub struct NotifyGrpcService {
    publisher: Arc<Publisher>,
    repository: Repository,
    cipher: Arc<AesGcmCipher>,
}

impl NotifyGrpcService {
    pub fn new(publisher: Arc<Publisher>, repository: Repository, cipher: Arc<AesGcmCipher>) -> Self {
        Self { publisher, repository, cipher }
    }
}

fn parse_scheduled_at(value: Option<String>) -> Result<Option<DateTime<Utc>>, Status> {
    match value {
        None => Ok(None),
        Some(s) if s.is_empty() => Ok(None),
        Some(s) => DateTime::parse_from_rfc3339(&s)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| Status::invalid_argument(format!("scheduled_at is not valid RFC3339: {e}"))),
    }
}

type ResponseStream = Pin<Box<dyn Stream<Item = Result<SendResponse, Status>> + Send + 'static>>;

#[tonic::async_trait]
impl Notify for NotifyGrpcService {
    async fn send_sms(&self, request: Request<SendSmsRequest>) -> Result<Response<SendResponse>, Status> {
        let req = request.into_inner();
        let scheduled_at = parse_scheduled_at(req.scheduled_at)?;
        let message_id = self
            .publisher
            .send_sms(CoreSendSmsRequest { body: req.body, receivers: req.receivers, scheduled_at })
            .await
            .map_err(to_status)?;
        Ok(Response::new(SendResponse { message_id: message_id.to_string() }))
    }

    type SendBatchSmsStream = ResponseStream;

    async fn send_batch_sms(&self, request: Request<Streaming<SendSmsRequest>>) -> Result<Response<Self::SendBatchSmsStream>, Status> {
        let mut incoming = request.into_inner();
        let publisher = Arc::clone(&self.publisher);
        let (tx, rx) = mpsc::channel(16);

        tokio::spawn(async move {
            while let Some(result) = incoming.message().await.transpose() {
                let response = match result {
                    Ok(req) => {
                        let outcome = async {
                            let scheduled_at = parse_scheduled_at(req.scheduled_at)?;
                            publisher
                                .send_sms(CoreSendSmsRequest { body: req.body, receivers: req.receivers, scheduled_at })
                                .await
                                .map_err(to_status)
                        }
                        .await;
                        outcome.map(|id| SendResponse { message_id: id.to_string() })
                    }
                    Err(status) => Err(status),
                };
                if tx.send(response).await.is_err() {
                    break;
                }
            }
        });

        Ok(Response::new(Box::pin(ReceiverStream::new(rx))))
    }

    async fn send_mail(&self, request: Request<SendMailRequest>) -> Result<Response<SendResponse>, Status> {
        let req = request.into_inner();
        let scheduled_at = parse_scheduled_at(req.scheduled_at)?;
        let message_id = self
            .publisher
            .send_mail(CoreSendMailRequest {
                sender_name: req.sender_name.unwrap_or_else(|| "Notify".to_string()),
                sender_address: req.sender_address.unwrap_or_else(|| "notify@notify.com".to_string()),
                subject: req.subject,
                body: req.body,
                receivers: req.receivers,
                scheduled_at,
            })
            .await
            .map_err(to_status)?;
        Ok(Response::new(SendResponse { message_id: message_id.to_string() }))
    }

    type SendBatchMailStream = ResponseStream;

    async fn send_batch_mail(&self, request: Request<Streaming<SendMailRequest>>) -> Result<Response<Self::SendBatchMailStream>, Status> {
        let mut incoming = request.into_inner();
        let publisher = Arc::clone(&self.publisher);
        let (tx, rx) = mpsc::channel(16);

        tokio::spawn(async move {
            while let Some(result) = incoming.message().await.transpose() {
                let response = match result {
                    Ok(req) => {
                        let outcome = async {
                            let scheduled_at = parse_scheduled_at(req.scheduled_at)?;
                            publisher
                                .send_mail(CoreSendMailRequest {
                                    sender_name: req.sender_name.unwrap_or_else(|| "Notify".to_string()),
                                    sender_address: req.sender_address.unwrap_or_else(|| "notify@notify.com".to_string()),
                                    subject: req.subject,
                                    body: req.body,
                                    receivers: req.receivers,
                                    scheduled_at,
                                })
                                .await
                                .map_err(to_status)
                        }
                        .await;
                        outcome.map(|id| SendResponse { message_id: id.to_string() })
                    }
                    Err(status) => Err(status),
                };
                if tx.send(response).await.is_err() {
                    break;
                }
            }
        });

        Ok(Response::new(Box::pin(ReceiverStream::new(rx))))
    }

    async fn cancel_scheduled_by_message_id(&self, request: Request<CancelScheduledByMessageIdRequest>) -> Result<Response<()>, Status> {
        let req = request.into_inner();
        let message_id = req
            .message_id
            .parse()
            .map_err(|e| Status::invalid_argument(format!("message_id is not a valid id: {e}")))?;
        cancel_scheduled_by_message_id(&self.repository, message_id).await.map_err(to_status)?;
        Ok(Response::new(()))
    }

    async fn list_status_with_paging(
        &self,
        request: Request<ListStatusWithPagingRequest>,
    ) -> Result<Response<ListStatusWithPagingResponse>, Status> {
        let req = request.into_inner();
        let page = req.page.unwrap_or_default();
        let start_at = DateTime::parse_from_rfc3339(&req.start_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| Status::invalid_argument(format!("start_at is not valid RFC3339: {e}")))?;
        let end_at = DateTime::parse_from_rfc3339(&req.end_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| Status::invalid_argument(format!("end_at is not valid RFC3339: {e}")))?;

        let core_request = CoreListRequest {
            message_type: req.message_type,
            message_id: req.message_id,
            receiver: req.receiver,
            page: CorePageRequest { index: page.index, size: page.size, sort_field: page.sort_field, sort_order: page.sort_order },
            start_at,
            end_at,
        };

        let result = list_status_with_paging(&self.repository, &self.cipher, &core_request).await.map_err(to_status)?;

        let targets = result
            .targets
            .into_iter()
            .map(|t| Target {
                id: t.id.to_string(),
                message_id: t.message_id.to_string(),
                message_type: t.message_type.as_str().to_string(),
                message_content: t.message_content,
                receiver: t.receiver,
                status: t.status,
                created_at: t.created_at.to_rfc3339(),
                updated_at: t.updated_at.to_rfc3339(),
            })
            .collect();

        Ok(Response::new(ListStatusWithPagingResponse {
            targets,
            paging: Some(PagingResult {
                index: core_request.page.index,
                size: core_request.page.size,
                total: result.total,
                sort_field: core_request.page.sort_field.unwrap_or_else(|| "created_at".to_string()),
                sort_order: core_request.page.sort_order.unwrap_or_else(|| "asc".to_string()),
            }),
        }))
    }
}
