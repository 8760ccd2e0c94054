//! Integration tests against an in-process mock server.
//!
//! The mock speaks the real wire protocol through mergedb-protocol and
//! keeps a small CRDT state, so the same updates can be observed through
//! interactive and static transactions alike. Two magic bucket names
//! trigger failure paths: "forbidden" answers reads with an error frame,
//! "readonly" answers updates with a false success flag.

use mergedb_client::{
    counter_inc, map_update, reg_put, set_add, Bucket, Client, ClientError, Host, Transaction,
};
use mergedb_protocol::{
    code, codec, BoundObject, CommitResp, CrdtType, CrdtValue, ErrorResp, MapEntry, MapKey,
    MapNestedUpdate, OperationResp, ReadObjects, ReadObjectsResp, StartTransactionResp,
    StaticReadObjects, StaticReadObjectsResp, StaticUpdateObjects, UpdateObjects, UpdateOp,
    UpdateOperation,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

// ---------------------------------------------------------------------------
// Mock server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Stored {
    Counter(i64),
    Set(Vec<Vec<u8>>),
    Reg(Vec<u8>),
    MvReg(Vec<u8>),
    Map(Vec<(MapKey, Stored)>),
}

impl Stored {
    fn fresh(crdt_type: CrdtType) -> Self {
        match crdt_type {
            CrdtType::Counter => Stored::Counter(0),
            CrdtType::OrSet => Stored::Set(Vec::new()),
            CrdtType::LwwReg => Stored::Reg(Vec::new()),
            CrdtType::MvReg => Stored::MvReg(Vec::new()),
            CrdtType::RrMap => Stored::Map(Vec::new()),
        }
    }

    fn apply(&mut self, op: &UpdateOperation) {
        match (self, op) {
            (Stored::Counter(value), UpdateOperation::Counter(u)) => *value += u.inc,
            (Stored::Set(values), UpdateOperation::Set(u)) => match u.op {
                mergedb_protocol::SetOpKind::Add => {
                    for elem in &u.elements {
                        if !values.contains(elem) {
                            values.push(elem.clone());
                        }
                    }
                }
                mergedb_protocol::SetOpKind::Remove => {
                    values.retain(|v| !u.elements.contains(v));
                }
            },
            (Stored::Reg(value), UpdateOperation::Reg(u)) => *value = u.value.clone(),
            (Stored::MvReg(value), UpdateOperation::Reg(u)) => *value = u.value.clone(),
            (Stored::Map(entries), UpdateOperation::Map(u)) => {
                for nested in &u.updates {
                    apply_nested(entries, nested);
                }
            }
            (slot, op) => panic!("type mismatch: {slot:?} vs {op:?}"),
        }
    }

    fn value(&self) -> CrdtValue {
        match self {
            Stored::Counter(value) => CrdtValue::Counter { value: *value },
            Stored::Set(values) => CrdtValue::Set {
                values: values.clone(),
            },
            Stored::Reg(value) => CrdtValue::Reg {
                value: value.clone(),
            },
            Stored::MvReg(value) => CrdtValue::MvReg {
                values: vec![value.clone()],
            },
            Stored::Map(entries) => CrdtValue::Map {
                entries: entries
                    .iter()
                    .map(|(key, stored)| MapEntry {
                        key: key.clone(),
                        value: stored.value(),
                    })
                    .collect(),
            },
        }
    }
}

fn apply_nested(entries: &mut Vec<(MapKey, Stored)>, nested: &MapNestedUpdate) {
    let crdt_type = nested.key.crdt_type;
    let slot = entries.iter_mut().find(|(k, _)| *k == nested.key);
    let slot = match slot {
        Some((_, stored)) => stored,
        None => {
            entries.push((nested.key.clone(), Stored::fresh(crdt_type)));
            &mut entries.last_mut().unwrap().1
        }
    };
    slot.apply(&nested.update);
}

type Store = HashMap<(Vec<u8>, Vec<u8>, CrdtType), Stored>;
type SharedStore = Arc<Mutex<Store>>;

fn apply_updates(store: &SharedStore, updates: &[UpdateOp]) {
    let mut store = store.lock().unwrap();
    for op in updates {
        let slot = store
            .entry((
                op.object.bucket.clone(),
                op.object.key.clone(),
                op.object.crdt_type,
            ))
            .or_insert_with(|| Stored::fresh(op.object.crdt_type));
        slot.apply(&op.operation);
    }
}

fn read_values(store: &SharedStore, objects: &[BoundObject]) -> Vec<CrdtValue> {
    let store = store.lock().unwrap();
    objects
        .iter()
        .map(|obj| {
            store
                .get(&(obj.bucket.clone(), obj.key.clone(), obj.crdt_type))
                .map(Stored::value)
                .unwrap_or_else(|| Stored::fresh(obj.crdt_type).value())
        })
        .collect()
}

struct MockServer {
    addr: String,
    requests: Arc<AtomicUsize>,
    accept_task: JoinHandle<()>,
    conn_tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl MockServer {
    async fn spawn(store: SharedStore) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let requests = Arc::new(AtomicUsize::new(0));
        let conn_tasks = Arc::new(Mutex::new(Vec::new()));

        let accept_task = {
            let requests = requests.clone();
            let conn_tasks = conn_tasks.clone();
            tokio::spawn(async move {
                let next_txid = Arc::new(AtomicU64::new(1));
                loop {
                    let Ok((stream, _)) = listener.accept().await else {
                        return;
                    };
                    let store = store.clone();
                    let requests = requests.clone();
                    let next_txid = next_txid.clone();
                    let task =
                        tokio::spawn(
                            async move { handle_conn(stream, store, requests, next_txid).await },
                        );
                    conn_tasks.lock().unwrap().push(task);
                }
            })
        };

        Self {
            addr,
            requests,
            accept_task,
            conn_tasks,
        }
    }

    fn host(&self) -> Host {
        let (name, port) = self.addr.rsplit_once(':').unwrap();
        Host::new(name, port.parse().unwrap())
    }

    fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Stops listening and severs every open connection.
    fn shutdown(&self) {
        self.accept_task.abort();
        for task in self.conn_tasks.lock().unwrap().drain(..) {
            task.abort();
        }
    }
}

async fn handle_conn(
    mut stream: TcpStream,
    store: SharedStore,
    requests: Arc<AtomicUsize>,
    next_txid: Arc<AtomicU64>,
) {
    loop {
        let Ok(frame) = codec::read_frame(&mut stream).await else {
            return;
        };
        requests.fetch_add(1, Ordering::SeqCst);

        let result = match frame.code {
            code::START_TRANSACTION => {
                let txid = next_txid.fetch_add(1, Ordering::SeqCst);
                let resp = StartTransactionResp {
                    transaction_descriptor: txid.to_be_bytes().to_vec(),
                };
                codec::write_msg(&mut stream, code::START_TRANSACTION_RESP, &resp).await
            }
            code::READ_OBJECTS => {
                let msg: ReadObjects = codec::decode_frame(&frame, frame.code).unwrap();
                respond_read(&mut stream, &store, &msg.objects, code::READ_OBJECTS_RESP).await
            }
            code::STATIC_READ_OBJECTS => {
                let msg: StaticReadObjects = codec::decode_frame(&frame, frame.code).unwrap();
                respond_read(
                    &mut stream,
                    &store,
                    &msg.objects,
                    code::STATIC_READ_OBJECTS_RESP,
                )
                .await
            }
            code::UPDATE_OBJECTS => {
                let msg: UpdateObjects = codec::decode_frame(&frame, frame.code).unwrap();
                if is_readonly(&msg.updates) {
                    let resp = OperationResp {
                        success: false,
                        error_code: Some(99),
                    };
                    codec::write_msg(&mut stream, code::OPERATION_RESP, &resp).await
                } else {
                    apply_updates(&store, &msg.updates);
                    let resp = OperationResp {
                        success: true,
                        error_code: None,
                    };
                    codec::write_msg(&mut stream, code::OPERATION_RESP, &resp).await
                }
            }
            code::STATIC_UPDATE_OBJECTS => {
                let msg: StaticUpdateObjects = codec::decode_frame(&frame, frame.code).unwrap();
                if is_readonly(&msg.updates) {
                    let resp = CommitResp {
                        success: false,
                        commit_time: None,
                        error_code: Some(99),
                    };
                    codec::write_msg(&mut stream, code::COMMIT_RESP, &resp).await
                } else {
                    apply_updates(&store, &msg.updates);
                    let resp = CommitResp {
                        success: true,
                        commit_time: None,
                        error_code: None,
                    };
                    codec::write_msg(&mut stream, code::COMMIT_RESP, &resp).await
                }
            }
            code::COMMIT_TRANSACTION => {
                let resp = CommitResp {
                    success: true,
                    commit_time: None,
                    error_code: None,
                };
                codec::write_msg(&mut stream, code::COMMIT_RESP, &resp).await
            }
            code::ABORT_TRANSACTION => {
                let resp = OperationResp {
                    success: true,
                    error_code: None,
                };
                codec::write_msg(&mut stream, code::OPERATION_RESP, &resp).await
            }
            other => {
                let resp = ErrorResp {
                    error_code: 1,
                    error_message: format!("unknown message code {other}").into_bytes(),
                };
                codec::write_msg(&mut stream, code::ERROR, &resp).await
            }
        };

        if result.is_err() {
            return;
        }
    }
}

fn is_readonly(updates: &[UpdateOp]) -> bool {
    updates.iter().any(|op| op.object.bucket == b"readonly")
}

async fn respond_read(
    stream: &mut TcpStream,
    store: &SharedStore,
    objects: &[BoundObject],
    resp_code: u8,
) -> Result<(), mergedb_protocol::ProtocolError> {
    if objects.iter().any(|obj| obj.bucket == b"forbidden") {
        let resp = ErrorResp {
            error_code: 42,
            error_message: b"forbidden bucket".to_vec(),
        };
        return codec::write_msg(stream, code::ERROR, &resp).await;
    }

    let objects = ReadObjectsResp {
        objects: read_values(store, objects),
    };
    if resp_code == code::STATIC_READ_OBJECTS_RESP {
        let resp = StaticReadObjectsResp {
            objects,
            commit_time: None,
        };
        codec::write_msg(stream, resp_code, &resp).await
    } else {
        codec::write_msg(stream, resp_code, &objects).await
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn single_server() -> (MockServer, Client) {
    init_tracing();
    let server = MockServer::spawn(Arc::new(Mutex::new(HashMap::new()))).await;
    let client = Client::new(vec![server.host()]).await.unwrap();
    (server, client)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn interactive_counter_roundtrip() {
    let (_server, client) = single_server().await;
    let bucket = Bucket::new("bucket");

    let mut tx = client.start_transaction().await.unwrap();
    bucket
        .update(&mut tx, vec![counter_inc("visits", 1)])
        .await
        .unwrap();
    assert_eq!(bucket.read_counter(&mut tx, "visits").await.unwrap(), 1);
    tx.commit().await.unwrap();

    let mut stx = client.create_static_transaction();
    assert_eq!(bucket.read_counter(&mut stx, "visits").await.unwrap(), 1);
}

#[tokio::test]
async fn static_and_interactive_updates_are_equivalent() {
    let (_server, client) = single_server().await;
    let bucket = Bucket::new("bucket");

    let mut stx = client.create_static_transaction();
    bucket
        .update(&mut stx, vec![counter_inc("static_key", 1)])
        .await
        .unwrap();
    assert_eq!(bucket.read_counter(&mut stx, "static_key").await.unwrap(), 1);

    let mut tx = client.start_transaction().await.unwrap();
    bucket
        .update(&mut tx, vec![counter_inc("interactive_key", 42)])
        .await
        .unwrap();
    tx.commit().await.unwrap();
    assert_eq!(
        bucket
            .read_counter(&mut stx, "interactive_key")
            .await
            .unwrap(),
        42
    );
}

#[tokio::test]
async fn map_nesting_roundtrip() {
    let (_server, client) = single_server().await;
    let bucket = Bucket::new("bucket");

    let mut stx = client.create_static_transaction();
    bucket
        .update(
            &mut stx,
            vec![map_update(
                "profile",
                vec![
                    counter_inc("counter", 13),
                    reg_put("reg", "Hello World"),
                    set_add("set", vec![b"A".to_vec(), b"B".to_vec()]),
                ],
            )],
        )
        .await
        .unwrap();

    let map = bucket.read_map(&mut stx, "profile").await.unwrap();
    assert_eq!(map.counter("counter").unwrap(), 13);
    assert_eq!(map.reg("reg").unwrap(), b"Hello World");

    let mut set = map.set("set").unwrap();
    set.sort();
    assert_eq!(set, vec![b"A".to_vec(), b"B".to_vec()]);

    assert_eq!(map.list_map_keys().len(), 3);
}

#[tokio::test]
async fn commit_is_idempotent_and_closes_the_transaction() {
    let (server, client) = single_server().await;
    let bucket = Bucket::new("bucket");

    let mut tx = client.start_transaction().await.unwrap();
    bucket
        .update(&mut tx, vec![counter_inc("n", 1)])
        .await
        .unwrap();
    tx.commit().await.unwrap();
    assert!(tx.is_finalized());

    // Second commit: no-op success with no further round trip.
    let requests_after_first = server.request_count();
    tx.commit().await.unwrap();
    assert_eq!(server.request_count(), requests_after_first);

    // Reads and updates fail fast, before any I/O.
    let err = bucket.update(&mut tx, vec![counter_inc("n", 1)]).await;
    assert!(matches!(err, Err(ClientError::TransactionClosed)));
    let err = bucket.read_counter(&mut tx, "n").await;
    assert!(matches!(err, Err(ClientError::TransactionClosed)));
    assert_eq!(server.request_count(), requests_after_first);
}

#[tokio::test]
async fn abort_is_idempotent_and_closes_the_transaction() {
    let (_server, client) = single_server().await;

    let mut tx = client.start_transaction().await.unwrap();
    tx.abort().await.unwrap();
    assert!(tx.is_finalized());
    tx.abort().await.unwrap();

    let err = tx.read(vec![]).await;
    assert!(matches!(err, Err(ClientError::TransactionClosed)));
}

#[tokio::test]
async fn transaction_pins_one_connection() {
    let (_server, client) = single_server().await;
    let bucket = Bucket::new("bucket");

    let mut tx1 = client.start_transaction().await.unwrap();
    let pinned = tx1.local_addr().unwrap();

    bucket
        .update(&mut tx1, vec![counter_inc("a", 1)])
        .await
        .unwrap();
    assert_eq!(tx1.local_addr().unwrap(), pinned);
    bucket.read_counter(&mut tx1, "a").await.unwrap();
    assert_eq!(tx1.local_addr().unwrap(), pinned);

    // A concurrent transaction gets its own connection.
    let mut tx2 = client.start_transaction().await.unwrap();
    assert_ne!(tx2.local_addr().unwrap(), pinned);

    tx2.commit().await.unwrap();
    tx1.commit().await.unwrap();
    assert_eq!(tx1.local_addr(), None);
}

#[tokio::test]
async fn server_error_frame_surfaces_for_any_expected_response() {
    let (_server, client) = single_server().await;
    let bucket = Bucket::new("forbidden");

    let mut stx = client.create_static_transaction();
    match bucket.read_counter(&mut stx, "k").await {
        Err(ClientError::Protocol(mergedb_protocol::ProtocolError::Server { code, message })) => {
            assert_eq!(code, 42);
            assert_eq!(message, "forbidden bucket");
        }
        other => panic!("expected server error, got {other:?}"),
    }

    // The connection survives a server error frame; later calls work.
    let ok_bucket = Bucket::new("bucket");
    assert_eq!(ok_bucket.read_counter(&mut stx, "k").await.unwrap(), 0);
}

#[tokio::test]
async fn false_success_flag_is_operation_failed() {
    let (_server, client) = single_server().await;
    let bucket = Bucket::new("readonly");

    // Static path: commit-shaped response with success == false.
    let mut stx = client.create_static_transaction();
    let err = bucket.update(&mut stx, vec![counter_inc("k", 1)]).await;
    assert!(matches!(
        err,
        Err(ClientError::OperationFailed { error_code: 99 })
    ));

    // Interactive path: operation response with success == false.
    let mut tx = client.start_transaction().await.unwrap();
    let err = bucket.update(&mut tx, vec![counter_inc("k", 1)]).await;
    assert!(matches!(
        err,
        Err(ClientError::OperationFailed { error_code: 99 })
    ));
    tx.abort().await.unwrap();
}

#[tokio::test]
async fn hosts_are_selected_roughly_uniformly() {
    let store: SharedStore = Arc::new(Mutex::new(HashMap::new()));
    let servers = [
        MockServer::spawn(store.clone()).await,
        MockServer::spawn(store.clone()).await,
        MockServer::spawn(store.clone()).await,
    ];
    let client = Client::new(servers.iter().map(MockServer::host).collect())
        .await
        .unwrap();

    let bucket = Bucket::new("bucket");
    let mut stx = client.create_static_transaction();
    for _ in 0..300 {
        bucket.read_counter(&mut stx, "k").await.unwrap();
    }

    for server in &servers {
        let count = server.request_count();
        // Expected ~100 of 300 each; no host may be starved.
        assert!(count >= 50, "host {} served only {count}", server.addr);
    }
}

#[tokio::test]
async fn all_dead_hosts_fail_with_all_connections_dead() {
    let (server, client) = single_server().await;
    let bucket = Bucket::new("bucket");
    server.shutdown();

    // The warm idle stream fails on first use and is discarded; once the
    // pool has to re-dial a dead listener, the scan reports every host
    // dead. Either way, no call blocks indefinitely.
    let mut stx = client.create_static_transaction();
    let mut saw_all_dead = false;
    for _ in 0..5 {
        match bucket.read_counter(&mut stx, "k").await {
            Ok(_) => panic!("read succeeded against a dead server"),
            Err(ClientError::AllConnectionsDead) => {
                saw_all_dead = true;
                break;
            }
            Err(_) => continue,
        }
    }
    assert!(saw_all_dead);
}

#[tokio::test]
async fn close_fails_subsequent_calls_deterministically() {
    let (_server, client) = single_server().await;
    client.close();

    let err = client.start_transaction().await;
    assert!(matches!(err, Err(ClientError::AllConnectionsDead)));

    let mut stx = client.create_static_transaction();
    let err = Bucket::new("bucket").read_counter(&mut stx, "k").await;
    assert!(matches!(err, Err(ClientError::AllConnectionsDead)));
}
