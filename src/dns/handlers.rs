use crate::error::Error;
use crate::resolver::{self, DynResolver};
use tracing::{debug, error};
use trust_dns_server::authority::MessageResponseBuilder;
use trust_dns_server::client::op::{Header, MessageType, OpCode, ResponseCode};
use trust_dns_server::client::rr::Record;
use trust_dns_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};

#[derive(Clone)]
pub struct Handler {
    resolver: DynResolver,
}

impl Handler {
    pub(super) fn new(resolver: DynResolver) -> Self {
        Handler { resolver }
    }

    async fn dispatch_request<R: ResponseHandler>(
        &self,
        request: &Request,
        response: R,
    ) -> Result<ResponseInfo, Error> {
        // If it isn't a query, return NOTIMPL.
        if request.op_code() != OpCode::Query || request.message_type() != MessageType::Query {
            return self.handle_notimpl(request, response).await;
        }

        // Otherwise answer the question. The response is sent even without answers, so
        // that a query that can't be answered looks the same whatever the reason.
        // NB: messages with more than one question never get here, they are answered with
        // FORMERR while being decoded.
        debug!("query from {}", request.src());
        let answers =
            resolver::answer_all(self.resolver.as_ref(), std::slice::from_ref(request.query()));
        self.send_auth_resp(request, response, &answers).await
    }

    async fn handle_notimpl<R: ResponseHandler>(
        &self,
        request: &Request,
        mut response_handle: R,
    ) -> Result<ResponseInfo, Error> {
        let response = MessageResponseBuilder::from_message_request(request);
        Ok(response_handle
            .send_response(response.error_msg(request.header(), ResponseCode::NotImp))
            .await?)
    }

    async fn send_auth_resp<R: ResponseHandler>(
        &self,
        request: &Request,
        mut response_handle: R,
        records: &[Record],
    ) -> Result<ResponseInfo, Error> {
        let mut header = Header::response_from_request(request.header());
        header.set_authoritative(true);
        let builder = MessageResponseBuilder::from_message_request(request);
        let response = builder.build(header, records.iter(), &[], &[], &[]);
        Ok(response_handle.send_response(response).await?)
    }
}

#[async_trait::async_trait]
impl RequestHandler for Handler {
    async fn handle_request<R: ResponseHandler>(
        &self,
        request: &Request,
        response_handle: R,
    ) -> ResponseInfo {
        match self.dispatch_request(request, response_handle).await {
            Ok(info) => info,
            Err(error) => {
                error!("error in RequestHandler: {:?}", error);
                let mut header = Header::new();
                header.set_response_code(ResponseCode::ServFail);
                header.into()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MappingRule, TokenService, APEX_KEY};
    use crate::resolver::{CnameRewriter, TokenResolver};
    use crate::token::{self, Secrets};
    use std::collections::HashMap;
    use std::io;
    use std::net::{Ipv4Addr, SocketAddr};
    use std::str::FromStr;
    use std::sync::{Arc, Mutex};
    use time::{Duration, OffsetDateTime};
    use trust_dns_server::authority::{MessageRequest, MessageResponse};
    use trust_dns_server::client::op::{Message, Query};
    use trust_dns_server::client::rr::{Name, RData, RecordType};
    use trust_dns_server::proto::serialize::binary::{BinDecodable, BinEncodable, BinEncoder};
    use trust_dns_server::server::Protocol;

    const DOMAIN: &str = "test-domain.co.uk";

    /// Captures the encoded response so it can be decoded again as a [`Message`].
    #[derive(Clone, Default)]
    struct TestResponseHandler {
        buf: Arc<Mutex<Vec<u8>>>,
    }

    impl TestResponseHandler {
        fn message(&self) -> Message {
            Message::from_vec(&self.buf.lock().unwrap()).unwrap()
        }
    }

    #[async_trait::async_trait]
    impl ResponseHandler for TestResponseHandler {
        async fn send_response<'a>(
            &mut self,
            response: MessageResponse<
                '_,
                'a,
                impl Iterator<Item = &'a Record> + Send + 'a,
                impl Iterator<Item = &'a Record> + Send + 'a,
                impl Iterator<Item = &'a Record> + Send + 'a,
                impl Iterator<Item = &'a Record> + Send + 'a,
            >,
        ) -> io::Result<ResponseInfo> {
            let mut buf = self.buf.lock().unwrap();
            buf.clear();
            let mut encoder = BinEncoder::new(&mut *buf);
            let info = response
                .destructive_emit(&mut encoder)
                .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
            Ok(info.into())
        }
    }

    fn token_handler() -> Handler {
        let service = TokenService {
            domain: Name::from_str(DOMAIN).unwrap().into(),
            secrets: Secrets::new(["other secret", "no-secret"]).unwrap(),
            txt_records: HashMap::from([
                (APEX_KEY.to_string(), "TLD TXT".to_string()),
                ("abc".to_string(), "abc TXT".to_string()),
            ]),
        };
        Handler::new(Arc::new(TokenResolver::new(&service, 60)))
    }

    fn request(message: &Message) -> Request {
        let bytes = message.to_bytes().unwrap();
        let message = MessageRequest::from_bytes(&bytes).unwrap();
        let src = SocketAddr::from((Ipv4Addr::LOCALHOST, 53000));
        Request::new(message, src, Protocol::Udp)
    }

    fn query_message(questions: &[(&str, RecordType)]) -> Message {
        let mut message = Message::new();
        message
            .set_id(1234)
            .set_message_type(MessageType::Query)
            .set_op_code(OpCode::Query);
        for (name, record_type) in questions {
            message.add_query(Query::query(Name::from_str(name).unwrap(), *record_type));
        }
        message
    }

    async fn exchange(handler: &Handler, message: &Message) -> Message {
        let response_handle = TestResponseHandler::default();
        handler
            .handle_request(&request(message), response_handle.clone())
            .await;
        response_handle.message()
    }

    fn hostname(ip: Ipv4Addr, secret: &[u8]) -> String {
        let expires = OffsetDateTime::now_utc() + Duration::hours(10);
        token::create_hostname(ip, expires, secret, DOMAIN)
    }

    #[tokio::test]
    async fn test_answers_valid_hostname() {
        let name = hostname(Ipv4Addr::new(127, 0, 0, 1), b"no-secret");
        let message = query_message(&[(name.as_str(), RecordType::A)]);
        let response = exchange(&token_handler(), &message).await;

        assert_eq!(response.id(), 1234);
        assert_eq!(response.message_type(), MessageType::Response);
        assert_eq!(response.response_code(), ResponseCode::NoError);
        assert!(response.authoritative());
        assert_eq!(response.answers().len(), 1);
        assert_eq!(response.answers()[0].ttl(), 60);
        assert_eq!(
            response.answers()[0].data(),
            Some(&RData::A(Ipv4Addr::new(127, 0, 0, 1)))
        );
    }

    #[tokio::test]
    async fn test_unanswerable_queries_get_empty_response() {
        let handler = token_handler();
        let name = hostname(Ipv4Addr::new(127, 0, 0, 1), b"no-secret");
        let wrong_secret = hostname(Ipv4Addr::new(127, 0, 0, 1), b"wrong secret");
        for name in [
            format!("a{name}"),
            wrong_secret,
            "garbage.test-domain.co.uk".to_string(),
            "example.com".to_string(),
        ] {
            let message = query_message(&[(name.as_str(), RecordType::A)]);
            let response = exchange(&handler, &message).await;
            assert_eq!(response.response_code(), ResponseCode::NoError, "{name}");
            assert!(response.answers().is_empty(), "{name}");
        }
    }

    #[tokio::test]
    async fn test_answers_txt() {
        let message = query_message(&[(DOMAIN, RecordType::TXT)]);
        let response = exchange(&token_handler(), &message).await;
        assert_eq!(response.answers().len(), 1);
        assert_eq!(response.answers()[0].record_type(), RecordType::TXT);
    }

    #[tokio::test]
    async fn test_answers_the_single_question() {
        let name = hostname(Ipv4Addr::new(10, 0, 0, 1), b"other secret");
        let message = query_message(&[(name.as_str(), RecordType::A)]);
        let response = exchange(&token_handler(), &message).await;

        assert_eq!(response.queries().len(), 1);
        assert_eq!(
            response.queries()[0].name().to_string().trim_end_matches('.'),
            name
        );
        let answers: Vec<_> = response.answers().iter().filter_map(Record::data).collect();
        assert_eq!(answers, vec![&RData::A(Ipv4Addr::new(10, 0, 0, 1))]);
    }

    #[tokio::test]
    async fn test_not_a_query_is_notimpl() {
        let mut message = query_message(&[(DOMAIN, RecordType::TXT)]);
        message.set_op_code(OpCode::Status);
        let response = exchange(&token_handler(), &message).await;
        assert_eq!(response.response_code(), ResponseCode::NotImp);
        assert!(response.answers().is_empty());
    }

    #[tokio::test]
    async fn test_cname_rewriter() {
        let rules = [MappingRule {
            source: ".proxy.example.com".to_string(),
            target: ".example.net".to_string(),
        }];
        let handler = Handler::new(Arc::new(CnameRewriter::new(&rules, 60)));
        let message = query_message(&[("www-dot-shop.proxy.example.com", RecordType::A)]);
        let response = exchange(&handler, &message).await;

        assert_eq!(response.answers().len(), 1);
        assert_eq!(
            response.answers()[0].data(),
            Some(&RData::CNAME(Name::from_str("www.shop.example.net.").unwrap()))
        );
    }
}
