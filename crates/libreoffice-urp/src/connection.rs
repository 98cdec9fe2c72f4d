//! A URP connection: protocol negotiation, synchronous calls and the
//! bootstrap of the office's component context.

use bytes::{BufMut, Bytes};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::error::{Result, UrpError};
use crate::interface::{
    x_component_context, x_interface, x_multi_component_factory, x_protocol_properties, MethodDef,
};
use crate::marshal;
use crate::protocol::{
    self, ReaderState, UrpMessage, UrpReply, UrpRequest, WriterState, FN_COMMIT_CHANGE,
    FN_RELEASE, FN_REQUEST_CHANGE, OID_PROTOCOL_PROPERTIES, TID_PROTOCOL_PROPERTIES,
};
use crate::proxy::{self, UnoProxy};
use crate::transport::Transport;
use crate::types::{type_names, Type, UnoValue};

/// Name under which `soffice --accept=...` publishes the component context.
pub const INITIAL_OBJECT: &str = "StarOffice.ComponentContext";

/// Protocol property that makes every call carry an `XCurrentContext`.
const PROP_CURRENT_CONTEXT: &str = "CurrentContext";

/// Give up after this many `requestChange` ties in a row.
const MAX_NEGOTIATION_TIES: u32 = 8;

/// The objects every session starts from.
#[derive(Debug, Clone)]
pub struct UnoEnvironment {
    pub context: UnoProxy,
    pub service_manager: UnoProxy,
    /// The desktop, as `XComponentLoader`.
    pub desktop: UnoProxy,
}

enum Outstanding {
    RequestChange,
    CommitChange,
}

/// One URP session with a remote office.
///
/// Calls are synchronous and issued from a single thread id, so replies
/// arrive in call order.
pub struct UrpConnection<S = TcpStream> {
    transport: Transport<S>,
    reader: ReaderState,
    writer: WriterState,
    tid: Vec<u8>,
    current_context: bool,
}

impl UrpConnection<TcpStream> {
    /// Connect to `host:port` and negotiate protocol properties.
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let addr = format!("{host}:{port}");
        let stream = TcpStream::connect(&addr).await.map_err(|e| {
            UrpError::Io(std::io::Error::new(
                e.kind(),
                format!("cannot connect to office at {addr}: {e}"),
            ))
        })?;
        stream.set_nodelay(true)?;
        tracing::info!(%addr, "connected to office");
        Self::from_stream(stream).await
    }
}

impl<S> UrpConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Run protocol negotiation over an already-open stream.
    pub async fn from_stream(stream: S) -> Result<Self> {
        let mut conn = Self {
            transport: Transport::new(stream),
            reader: ReaderState::new(),
            writer: WriterState::new(),
            tid: format!("cellhue-{:016x}", rand::random::<u64>()).into_bytes(),
            current_context: false,
        };
        conn.negotiate().await?;
        Ok(conn)
    }

    /// Whether calls carry a (null) current context.
    pub fn uses_current_context(&self) -> bool {
        self.current_context
    }

    async fn recv(&mut self) -> Result<UrpMessage> {
        let (payload, count) = self.transport.recv_block().await?;
        if count != 1 {
            return Err(UrpError::Protocol(format!(
                "block carries {count} messages, expected 1"
            )));
        }
        self.reader.decode_message(payload)
    }

    async fn reply(&mut self, tid: &[u8], body: &[u8]) -> Result<()> {
        let mut msg = self.writer.encode_reply(tid, false);
        msg.put_slice(body);
        self.transport.send_message(&msg).await
    }

    async fn send_negotiation(&mut self, method: &MethodDef, body: &[u8]) -> Result<()> {
        let mut msg = self.writer.encode_request(
            method.index,
            &Type::interface(type_names::X_PROTOCOL_PROPERTIES),
            OID_PROTOCOL_PROPERTIES,
            TID_PROTOCOL_PROPERTIES,
            true,
        );
        msg.put_slice(body);
        self.transport.send_message(&msg).await
    }

    /// Agree with the peer on `CurrentContext`.
    ///
    /// Both sides may send `requestChange` with a random number; the larger
    /// number commits. A peer that answers with an exception does not
    /// support protocol properties and the session runs without them.
    async fn negotiate(&mut self) -> Result<()> {
        let mut random: i32 = rand::random();
        let mut ties = 0;
        tracing::debug!(random, "sending requestChange");
        self.send_negotiation(
            &x_protocol_properties::REQUEST_CHANGE,
            &protocol::request_change_body(random),
        )
        .await?;

        let mut outstanding = Some(Outstanding::RequestChange);
        let mut settled: Option<bool> = None;

        while outstanding.is_some() || settled.is_none() {
            match self.recv().await? {
                UrpMessage::Reply(reply) => match outstanding.take() {
                    Some(Outstanding::RequestChange) => {
                        if reply.is_exception {
                            tracing::debug!("peer does not negotiate protocol properties");
                            settled = Some(false);
                            continue;
                        }
                        let mut body = reply.body;
                        let answer = marshal::read_value(&mut body, &Type::long(), &mut self.reader.caches)?
                            .as_i64()
                            .unwrap_or_default();
                        match answer {
                            1 => {
                                tracing::debug!("won negotiation, committing CurrentContext");
                                let body = protocol::commit_change_body(
                                    &[PROP_CURRENT_CONTEXT],
                                    &mut self.writer.caches,
                                );
                                self.send_negotiation(&x_protocol_properties::COMMIT_CHANGE, &body)
                                    .await?;
                                outstanding = Some(Outstanding::CommitChange);
                            }
                            0 => tracing::debug!("lost negotiation, waiting for commitChange"),
                            -1 => {
                                ties += 1;
                                if ties >= MAX_NEGOTIATION_TIES {
                                    return Err(UrpError::NegotiationFailed(format!(
                                        "{ties} requestChange ties in a row"
                                    )));
                                }
                                random = rand::random();
                                tracing::debug!(random, "requestChange tie, retrying");
                                self.send_negotiation(
                                    &x_protocol_properties::REQUEST_CHANGE,
                                    &protocol::request_change_body(random),
                                )
                                .await?;
                                outstanding = Some(Outstanding::RequestChange);
                            }
                            other => {
                                return Err(UrpError::NegotiationFailed(format!(
                                    "requestChange answered {other}"
                                )))
                            }
                        }
                    }
                    Some(Outstanding::CommitChange) => {
                        if reply.is_exception {
                            tracing::warn!("peer rejected commitChange");
                        }
                        settled = Some(!reply.is_exception);
                    }
                    None => {
                        return Err(UrpError::Protocol(
                            "unexpected reply during negotiation".into(),
                        ))
                    }
                },
                UrpMessage::Request(req) if req.oid == OID_PROTOCOL_PROPERTIES => {
                    match req.function_id {
                        FN_REQUEST_CHANGE => {
                            let mut body = req.body.clone();
                            let theirs = marshal::read_value(&mut body, &Type::long(), &mut self.reader.caches)?
                                .as_i64()
                                .unwrap_or_default();
                            let answer: i32 = match i64::from(random).cmp(&theirs) {
                                std::cmp::Ordering::Greater => 0,
                                std::cmp::Ordering::Less => 1,
                                std::cmp::Ordering::Equal => -1,
                            };
                            tracing::debug!(ours = random, theirs, answer, "peer sent requestChange");
                            self.reply(&req.tid, &answer.to_be_bytes()).await?;
                        }
                        FN_COMMIT_CHANGE => {
                            let names = self.commit_change_names(req.body.clone())?;
                            let enabled = names.iter().any(|n| n == PROP_CURRENT_CONTEXT);
                            tracing::debug!(?names, "peer committed protocol properties");
                            self.reply(&req.tid, &[]).await?;
                            settled = Some(enabled);
                        }
                        other => {
                            return Err(UrpError::Protocol(format!(
                                "unsupported protocol-property call {other}"
                            )))
                        }
                    }
                }
                UrpMessage::Request(req) => self.answer_stray(req).await?,
            }
        }

        self.current_context = settled.unwrap_or(false);
        tracing::debug!(current_context = self.current_context, "negotiation finished");
        Ok(())
    }

    fn commit_change_names(&mut self, mut body: Bytes) -> Result<Vec<String>> {
        let props = marshal::read_value(
            &mut body,
            &Type::sequence(type_names::PROTOCOL_PROPERTY),
            &mut self.reader.caches,
        )?;
        let UnoValue::Sequence(items) = props else {
            return Ok(Vec::new());
        };
        Ok(items
            .iter()
            .filter_map(|item| match item {
                UnoValue::Struct(members) => members.first().and_then(UnoValue::as_str),
                _ => None,
            })
            .map(str::to_string)
            .collect())
    }

    /// Requests from the office while we wait for a reply. Nothing on this
    /// side is exported, so releases are dropped and anything else gets a
    /// void reply.
    async fn answer_stray(&mut self, req: UrpRequest) -> Result<()> {
        if req.function_id == FN_RELEASE {
            tracing::trace!(oid = %req.oid, "ignoring release");
            return Ok(());
        }
        tracing::debug!(oid = %req.oid, function = req.function_id, "unexpected request from office");
        if req.must_reply {
            self.reply(&req.tid, &[]).await?;
        }
        Ok(())
    }

    /// Invoke `method` on `target` and wait for its result.
    pub async fn call(
        &mut self,
        target: &UnoProxy,
        method: &MethodDef,
        args: &[UnoValue],
    ) -> Result<UnoValue> {
        let mut msg = self.writer.encode_request(
            method.index,
            &target.interface,
            &target.oid,
            &self.tid,
            !method.one_way,
        );
        if self.current_context && !method.one_way {
            protocol::write_null_current_context(&mut msg);
        }
        let params = proxy::encode_params(method, args, &mut self.writer.caches)?;
        msg.extend_from_slice(&params);

        tracing::trace!(method = method.name, oid = %target.oid, "call");
        self.transport.send_message(&msg).await?;
        if method.one_way {
            return Ok(UnoValue::Void);
        }

        loop {
            match self.recv().await? {
                UrpMessage::Reply(reply) => return self.finish_call(method, reply),
                UrpMessage::Request(req) => self.answer_stray(req).await?,
            }
        }
    }

    fn finish_call(&mut self, method: &MethodDef, reply: UrpReply) -> Result<UnoValue> {
        if reply.tid != self.tid {
            return Err(UrpError::Protocol(format!(
                "reply to {} arrived on a foreign thread id",
                method.name
            )));
        }
        let mut body = reply.body;
        if reply.is_exception {
            let raised = marshal::read_value(&mut body, &Type::any(), &mut self.reader.caches)?;
            return Err(match raised.unwrap_any() {
                UnoValue::Exception(exc) => UrpError::RemoteException {
                    type_name: exc.type_name.clone(),
                    message: exc.message.clone(),
                },
                other => UrpError::RemoteException {
                    type_name: "unknown".into(),
                    message: format!("{other:?}"),
                },
            });
        }
        proxy::decode_return(method, body, &mut self.reader.caches)
    }

    /// `queryInterface` for `interface_name`; `None` if the object lacks it.
    pub async fn query_interface(
        &mut self,
        target: &UnoProxy,
        interface_name: &str,
    ) -> Result<Option<UnoProxy>> {
        let wanted = Type::interface(interface_name);
        let via = target.retyped(type_names::X_INTERFACE);
        let result = self
            .call(&via, &x_interface::QUERY_INTERFACE, &[UnoValue::Type(wanted.clone())])
            .await?;
        proxy::query_interface_result(result, wanted)
    }

    /// Like [`query_interface`](Self::query_interface), but a missing
    /// interface is an error.
    pub async fn require_interface(
        &mut self,
        target: &UnoProxy,
        interface_name: &str,
    ) -> Result<UnoProxy> {
        self.query_interface(target, interface_name)
            .await?
            .ok_or_else(|| {
                UrpError::Protocol(format!("object {} does not implement {interface_name}", target.oid))
            })
    }

    /// Drop one reference to `target`.
    ///
    /// The office counts references per object and interface type, so
    /// `target` must carry the type the reference arrived with. Every
    /// reference received is released once.
    pub async fn release(&mut self, target: &UnoProxy) -> Result<()> {
        tracing::trace!(oid = %target.oid, interface = %target.interface.name, "release");
        self.call(target, &x_interface::RELEASE, &[]).await?;
        Ok(())
    }

    /// Resolve the component context, its service manager and the desktop.
    pub async fn bootstrap(&mut self) -> Result<UnoEnvironment> {
        let initial = UnoProxy::new(INITIAL_OBJECT, Type::interface(type_names::X_INTERFACE));
        let context = self
            .require_interface(&initial, type_names::X_COMPONENT_CONTEXT)
            .await?;
        tracing::debug!(oid = %context.oid, "got component context");

        let service_manager = self
            .call(&context, &x_component_context::GET_SERVICE_MANAGER, &[])
            .await?
            .interface_oid()
            .map(|oid| UnoProxy::new(oid, Type::interface(type_names::X_MULTI_COMPONENT_FACTORY)))
            .ok_or_else(|| UrpError::Protocol("getServiceManager returned null".into()))?;

        let desktop_oid = self
            .call(
                &service_manager,
                &x_multi_component_factory::CREATE_INSTANCE_WITH_CONTEXT,
                &[
                    UnoValue::String(type_names::SERVICE_DESKTOP.to_string()),
                    UnoValue::Interface(context.oid.clone()),
                ],
            )
            .await?
            .interface_oid()
            .map(str::to_string)
            .ok_or_else(|| UrpError::Protocol("desktop service could not be created".into()))?;
        let desktop = self
            .require_interface(
                &UnoProxy::new(desktop_oid, Type::interface(type_names::X_INTERFACE)),
                type_names::X_COMPONENT_LOADER,
            )
            .await?;
        tracing::info!(oid = %desktop.oid, "office desktop ready");

        Ok(UnoEnvironment {
            context,
            service_manager,
            desktop,
        })
    }
}
