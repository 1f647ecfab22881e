use time::OffsetDateTime;
use tracing::trace;

use super::kmip_types::{KmipEnum, Operation, ResultReason, ResultStatus, Tag};
use crate::{KmipError, KmipResult, kmip_bail, ttlv::TTLV};

pub const PROTOCOL_VERSION_MAJOR: i32 = 1;
pub const PROTOCOL_VERSION_MINOR: i32 = 4;

/// A single batch item KMIP 1.4 request
#[derive(Debug, Clone)]
pub struct RequestMessage {
    pub operation: Operation,
    /// Children of the Request Payload structure
    pub payload: Vec<TTLV>,
    pub client_correlation_value: Option<String>,
}

impl RequestMessage {
    #[must_use]
    pub const fn new(operation: Operation, payload: Vec<TTLV>) -> Self {
        Self {
            operation,
            payload,
            client_correlation_value: None,
        }
    }

    /// Tag the request with a fresh random correlation value
    #[must_use]
    pub fn with_random_correlation_value(mut self) -> Self {
        self.client_correlation_value = Some(uuid::Uuid::new_v4().to_string());
        self
    }

    pub fn to_ttlv(&self) -> TTLV {
        let mut header = vec![TTLV::structure(
            Tag::ProtocolVersion,
            vec![
                TTLV::integer(Tag::ProtocolVersionMajor, PROTOCOL_VERSION_MAJOR),
                TTLV::integer(Tag::ProtocolVersionMinor, PROTOCOL_VERSION_MINOR),
            ],
        )];
        if let Some(correlation) = &self.client_correlation_value {
            header.push(TTLV::text(Tag::ClientCorrelationValue, correlation.clone()));
        }
        header.push(TTLV::integer(Tag::BatchCount, 1));

        TTLV::structure(
            Tag::RequestMessage,
            vec![
                TTLV::structure(Tag::RequestHeader, header),
                TTLV::structure(
                    Tag::BatchItem,
                    vec![
                        TTLV::enumeration(Tag::Operation, self.operation.to_u32()),
                        TTLV::structure(Tag::RequestPayload, self.payload.clone()),
                    ],
                ),
            ],
        )
    }
}

#[derive(Debug, Clone)]
pub struct ResponseBatchItem {
    pub operation: Option<Operation>,
    pub result_status: ResultStatus,
    pub result_reason: Option<ResultReason>,
    pub result_message: Option<String>,
    pub payload: Option<TTLV>,
}

#[derive(Debug, Clone)]
pub struct ResponseMessage {
    pub protocol_version: (i32, i32),
    pub time_stamp: Option<OffsetDateTime>,
    pub client_correlation_value: Option<String>,
    pub batch_items: Vec<ResponseBatchItem>,
}

impl ResponseMessage {
    pub fn from_ttlv(ttlv: &TTLV) -> KmipResult<Self> {
        if ttlv.tag != Tag::ResponseMessage {
            kmip_bail!(KmipError::InvalidMessage(format!(
                "expected a ResponseMessage, got a {}",
                ttlv.tag
            )));
        }
        let header = ttlv.require(Tag::ResponseHeader)?;
        let version = header.require(Tag::ProtocolVersion)?;
        let protocol_version = (
            version.require(Tag::ProtocolVersionMajor)?.as_integer()?,
            version.require(Tag::ProtocolVersionMinor)?.as_integer()?,
        );
        let time_stamp = header
            .child(Tag::TimeStamp)
            .map(TTLV::as_date_time)
            .transpose()?;
        let client_correlation_value = header
            .child(Tag::ClientCorrelationValue)
            .map(|v| v.as_text().map(ToOwned::to_owned))
            .transpose()?;

        let batch_items = ttlv
            .children(Tag::BatchItem)
            .map(parse_batch_item)
            .collect::<KmipResult<Vec<_>>>()?;
        trace!(
            "KMIP response v{}.{} with {} batch item(s)",
            protocol_version.0,
            protocol_version.1,
            batch_items.len()
        );

        Ok(Self {
            protocol_version,
            time_stamp,
            client_correlation_value,
            batch_items,
        })
    }

    /// Payload of the single batch item answering `operation`.
    /// A non-success result status is turned into
    /// [`KmipError::OperationFailed`].
    pub fn into_payload(self, operation: Operation) -> KmipResult<TTLV> {
        let Some(item) = self.batch_items.into_iter().next() else {
            kmip_bail!(KmipError::InvalidMessage(
                "response holds no batch item".to_owned()
            ));
        };
        if item.result_status != ResultStatus::Success {
            let reason = item
                .result_reason
                .map_or_else(|| item.result_status.to_string(), |r| r.to_string());
            return Err(KmipError::OperationFailed(
                reason,
                item.result_message.unwrap_or_default(),
            ));
        }
        if let Some(op) = item.operation {
            if op != operation {
                kmip_bail!(KmipError::InvalidMessage(format!(
                    "expected a {operation} response, got a {op} response"
                )));
            }
        }
        item.payload.ok_or_else(|| {
            KmipError::InvalidMessage(format!("{operation} response has no payload"))
        })
    }
}

fn parse_batch_item(item: &TTLV) -> KmipResult<ResponseBatchItem> {
    let operation = item
        .child(Tag::Operation)
        .map(|op| {
            let value = op.as_enum()?;
            Operation::from_u32(value)
                .ok_or_else(|| KmipError::InvalidMessage(format!("unknown operation {value:#x}")))
        })
        .transpose()?;
    let status = item.require(Tag::ResultStatus)?.as_enum()?;
    let result_status = ResultStatus::from_u32(status)
        .ok_or_else(|| KmipError::InvalidMessage(format!("unknown result status {status:#x}")))?;
    // unknown reasons are dropped rather than hiding the server message
    let result_reason = item
        .child(Tag::ResultReason)
        .and_then(|r| r.as_enum().ok())
        .and_then(ResultReason::from_u32);
    let result_message = item
        .child(Tag::ResultMessage)
        .map(|m| m.as_text().map(ToOwned::to_owned))
        .transpose()?;
    Ok(ResponseBatchItem {
        operation,
        result_status,
        result_reason,
        result_message,
        payload: item.child(Tag::ResponsePayload).cloned(),
    })
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::{RequestMessage, ResponseMessage};
    use crate::{
        KmipError,
        kmip_1_4::kmip_types::{KmipEnum, Operation, ResultReason, ResultStatus, Tag},
        ttlv::TTLV,
    };

    fn response(status: ResultStatus, extra: Vec<TTLV>) -> TTLV {
        let mut item = vec![
            TTLV::enumeration(Tag::Operation, Operation::Activate.to_u32()),
            TTLV::enumeration(Tag::ResultStatus, status.to_u32()),
        ];
        item.extend(extra);
        TTLV::structure(
            Tag::ResponseMessage,
            vec![
                TTLV::structure(
                    Tag::ResponseHeader,
                    vec![
                        TTLV::structure(
                            Tag::ProtocolVersion,
                            vec![
                                TTLV::integer(Tag::ProtocolVersionMajor, 1),
                                TTLV::integer(Tag::ProtocolVersionMinor, 4),
                            ],
                        ),
                        TTLV::integer(Tag::BatchCount, 1),
                    ],
                ),
                TTLV::structure(Tag::BatchItem, item),
            ],
        )
    }

    #[test]
    fn test_request_layout() {
        let request = RequestMessage::new(
            Operation::Activate,
            vec![TTLV::text(Tag::UniqueIdentifier, "id-1")],
        )
        .with_random_correlation_value();
        let ttlv = request.to_ttlv();

        let header = ttlv.require(Tag::RequestHeader).unwrap();
        let version = header.require(Tag::ProtocolVersion).unwrap();
        assert_eq!(
            version.require(Tag::ProtocolVersionMinor).unwrap().as_integer().unwrap(),
            4
        );
        let correlation = header
            .require(Tag::ClientCorrelationValue)
            .unwrap()
            .as_text()
            .unwrap();
        assert!(uuid::Uuid::parse_str(correlation).is_ok());
        assert_eq!(header.require(Tag::BatchCount).unwrap().as_integer().unwrap(), 1);

        let item = ttlv.require(Tag::BatchItem).unwrap();
        assert_eq!(
            item.require(Tag::Operation).unwrap().as_enum().unwrap(),
            Operation::Activate.to_u32()
        );
        let payload = item.require(Tag::RequestPayload).unwrap();
        assert_eq!(
            payload.require(Tag::UniqueIdentifier).unwrap().as_text().unwrap(),
            "id-1"
        );
        // the whole message survives the wire
        assert_eq!(TTLV::from_bytes(&ttlv.to_bytes().unwrap()).unwrap(), ttlv);
    }

    #[test]
    fn test_success_payload() {
        let ttlv = response(
            ResultStatus::Success,
            vec![TTLV::structure(
                Tag::ResponsePayload,
                vec![TTLV::text(Tag::UniqueIdentifier, "id-1")],
            )],
        );
        let payload = ResponseMessage::from_ttlv(&ttlv)
            .unwrap()
            .into_payload(Operation::Activate)
            .unwrap();
        assert_eq!(
            payload.require(Tag::UniqueIdentifier).unwrap().as_text().unwrap(),
            "id-1"
        );
    }

    #[test]
    fn test_failure_becomes_operation_failed() {
        let ttlv = response(
            ResultStatus::OperationFailed,
            vec![
                TTLV::enumeration(Tag::ResultReason, ResultReason::ItemNotFound.to_u32()),
                TTLV::text(Tag::ResultMessage, "object not found"),
            ],
        );
        let err = ResponseMessage::from_ttlv(&ttlv)
            .unwrap()
            .into_payload(Operation::Activate)
            .unwrap_err();
        assert!(matches!(err, KmipError::OperationFailed(_, _)));
        assert_eq!(err.to_string(), "ItemNotFound: object not found");
    }

    #[test]
    fn test_operation_mismatch() {
        let ttlv = response(
            ResultStatus::Success,
            vec![TTLV::structure(Tag::ResponsePayload, vec![])],
        );
        let err = ResponseMessage::from_ttlv(&ttlv)
            .unwrap()
            .into_payload(Operation::Destroy)
            .unwrap_err();
        assert!(err.to_string().contains("expected a Destroy response"));
    }

    #[test]
    fn test_not_a_response() {
        let ttlv = TTLV::integer(Tag::BatchCount, 1);
        ResponseMessage::from_ttlv(&ttlv).unwrap_err();
    }
}
