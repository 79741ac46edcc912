use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use redis::aio::MultiplexedConnection;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

const MAX_CONNECTIONS: usize = 100;
const MAX_IDLE_TIME: Duration = Duration::from_secs(20 * 60);

/// Bounded Redis pool: at most `MAX_CONNECTIONS` connections are checked
/// out at once, returned connections are parked for reuse, and parked
/// connections idle longer than `MAX_IDLE_TIME` are dropped. One pool is
/// shared across all requests in the process.
#[derive(Clone)]
pub struct RedisClient {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    client: redis::Client,
    idle: Mutex<Vec<IdleEntry>>,
    permits: Arc<Semaphore>,
}

struct IdleEntry {
    conn: MultiplexedConnection,
    parked_at: Instant,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self {
            inner: Arc::new(PoolInner {
                client,
                idle: Mutex::new(Vec::new()),
                permits: Arc::new(Semaphore::new(MAX_CONNECTIONS)),
            }),
        })
    }

    /// Checks a connection out of the pool, waiting when all
    /// `MAX_CONNECTIONS` are in use. New connections are only dialed when
    /// no parked one is available.
    pub async fn connection(&self) -> Result<PooledConnection, redis::RedisError> {
        let permit = Arc::clone(&self.inner.permits)
            .acquire_owned()
            .await
            .expect("pool semaphore closed");

        let conn = match self.inner.checkout_idle() {
            Some(conn) => conn,
            None => self.inner.client.get_multiplexed_async_connection().await?,
        };

        Ok(PooledConnection {
            conn: Some(conn),
            pool: Arc::clone(&self.inner),
            _permit: permit,
        })
    }
}

impl PoolInner {
    fn checkout_idle(&self) -> Option<MultiplexedConnection> {
        let mut idle = self.idle.lock().expect("redis pool lock poisoned");
        let now = Instant::now();
        // expired entries are reaped here rather than by a background task
        idle.retain(|entry| now.duration_since(entry.parked_at) < MAX_IDLE_TIME);
        idle.pop().map(|entry| entry.conn)
    }

    fn park(&self, conn: MultiplexedConnection) {
        self.idle
            .lock()
            .expect("redis pool lock poisoned")
            .push(IdleEntry {
                conn,
                parked_at: Instant::now(),
            });
    }
}

/// A checked-out connection. Dropping it returns the connection to the
/// pool and releases its permit.
pub struct PooledConnection {
    conn: Option<MultiplexedConnection>,
    pool: Arc<PoolInner>,
    _permit: OwnedSemaphorePermit,
}

impl Deref for PooledConnection {
    type Target = MultiplexedConnection;

    fn deref(&self) -> &Self::Target {
        self.conn.as_ref().expect("connection already returned")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut().expect("connection already returned")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.park(conn);
        }
    }
}
