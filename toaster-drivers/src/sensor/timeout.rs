//! Bounded sensor reads
//!
//! Moves a sensor onto a worker thread so a stuck bus transfer cannot stall
//! the control loop. A read that does not complete within the timeout is
//! reported as [`SensorFault::Timeout`]; its late reply is discarded. At most
//! one request is in flight: while the worker is still busy with a timed-out
//! read, further reads fail with `Timeout` without queueing another request.

use std::io;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use toaster_core::traits::{SensorFault, TemperatureSensor};

struct Reply {
    sequence: u64,
    result: Result<f64, SensorFault>,
    reference: f64,
}

/// Sensor wrapper enforcing a per-read timeout
pub struct TimeoutSensor {
    requests: Option<Sender<u64>>,
    replies: Receiver<Reply>,
    worker: Option<JoinHandle<()>>,
    timeout: Duration,
    sequence: u64,
    /// Sequence number of a timed-out request the worker has not answered
    outstanding: Option<u64>,
    reference: f64,
}

impl TimeoutSensor {
    /// Start a worker thread owning `sensor`
    pub fn spawn<S>(mut sensor: S, timeout: Duration) -> io::Result<Self>
    where
        S: TemperatureSensor + Send + 'static,
    {
        let (request_tx, request_rx) = mpsc::channel::<u64>();
        let (reply_tx, reply_rx) = mpsc::channel();

        let worker = thread::Builder::new()
            .name("sensor".into())
            .spawn(move || {
                for sequence in request_rx {
                    let result = sensor.read();
                    let reply = Reply {
                        sequence,
                        result,
                        reference: sensor.reference_temperature(),
                    };
                    if reply_tx.send(reply).is_err() {
                        break;
                    }
                }
                sensor.cleanup();
            })?;

        Ok(Self {
            requests: Some(request_tx),
            replies: reply_rx,
            worker: Some(worker),
            timeout,
            sequence: 0,
            outstanding: None,
            reference: 0.0,
        })
    }

    /// Per-read timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Check if the worker is still busy with a timed-out read
    pub fn is_stalled(&self) -> bool {
        self.outstanding.is_some()
    }

    // Drain late replies; true once the worker is idle again
    fn poll_outstanding(&mut self) -> bool {
        let Some(pending) = self.outstanding else {
            return true;
        };
        loop {
            match self.replies.try_recv() {
                Ok(reply) if reply.sequence == pending => {
                    self.outstanding = None;
                    return true;
                }
                Ok(_) => continue,
                Err(TryRecvError::Empty) => return false,
                Err(TryRecvError::Disconnected) => {
                    self.outstanding = None;
                    return true;
                }
            }
        }
    }
}

impl TemperatureSensor for TimeoutSensor {
    fn read(&mut self) -> Result<f64, SensorFault> {
        if !self.poll_outstanding() {
            return Err(SensorFault::Timeout);
        }
        let requests = self.requests.as_ref().ok_or(SensorFault::Bus)?;

        self.sequence += 1;
        requests.send(self.sequence).map_err(|_| SensorFault::Bus)?;

        let deadline = Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.replies.recv_timeout(remaining) {
                Ok(reply) if reply.sequence == self.sequence => {
                    if reply.result.is_ok() {
                        self.reference = reply.reference;
                    }
                    return reply.result;
                }
                // Late reply to a read that already timed out
                Ok(_) => continue,
                Err(RecvTimeoutError::Timeout) => {
                    self.outstanding = Some(self.sequence);
                    log::warn!(
                        target: "toaster::sensor",
                        "Sensor read {} timed out after {:?}",
                        self.sequence,
                        self.timeout
                    );
                    return Err(SensorFault::Timeout);
                }
                Err(RecvTimeoutError::Disconnected) => return Err(SensorFault::Bus),
            }
        }
    }

    fn reference_temperature(&self) -> f64 {
        self.reference
    }

    /// Stop the worker and wait (up to one timeout) for it to exit
    ///
    /// A worker stuck in a transfer is left detached.
    fn cleanup(&mut self) {
        self.requests = None;
        let Some(worker) = self.worker.take() else {
            return;
        };

        let deadline = Instant::now() + self.timeout;
        while !worker.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }

        if worker.is_finished() {
            if worker.join().is_err() {
                log::error!(target: "toaster::sensor", "Sensor worker panicked");
            }
        } else {
            log::warn!(target: "toaster::sensor", "Sensor worker did not exit, detaching");
        }
    }
}

impl Drop for TimeoutSensor {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    struct SlowSensor {
        delay: Duration,
        value: f64,
        reads: Arc<AtomicUsize>,
        cleaned: Arc<AtomicBool>,
    }

    impl TemperatureSensor for SlowSensor {
        fn read(&mut self) -> Result<f64, SensorFault> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            thread::sleep(self.delay);
            self.value += 1.0;
            Ok(self.value)
        }

        fn reference_temperature(&self) -> f64 {
            21.5
        }

        fn cleanup(&mut self) {
            self.cleaned.store(true, Ordering::SeqCst);
        }
    }

    fn slow(delay_ms: u64) -> (SlowSensor, Arc<AtomicBool>) {
        let cleaned = Arc::new(AtomicBool::new(false));
        let sensor = SlowSensor {
            delay: Duration::from_millis(delay_ms),
            value: 0.0,
            reads: Arc::new(AtomicUsize::new(0)),
            cleaned: cleaned.clone(),
        };
        (sensor, cleaned)
    }

    #[test]
    fn test_fast_read_passes_through() {
        let (sensor, _) = slow(0);
        let mut wrapped = TimeoutSensor::spawn(sensor, Duration::from_secs(1)).unwrap();
        assert_eq!(wrapped.read(), Ok(1.0));
        assert_eq!(wrapped.read(), Ok(2.0));
        assert_eq!(wrapped.reference_temperature(), 21.5);
    }

    #[test]
    fn test_slow_read_times_out_and_late_reply_is_dropped() {
        let (sensor, _) = slow(200);
        let mut wrapped = TimeoutSensor::spawn(sensor, Duration::from_millis(20)).unwrap();
        assert_eq!(wrapped.read(), Err(SensorFault::Timeout));
        assert!(wrapped.is_stalled());

        // Let the late reply to read 1 land, it is discarded
        thread::sleep(Duration::from_millis(300));
        wrapped.timeout = Duration::from_secs(5);
        assert_eq!(wrapped.read(), Ok(2.0));
        assert!(!wrapped.is_stalled());
    }

    #[test]
    fn test_stuck_worker_keeps_one_request_in_flight() {
        let (sensor, _) = slow(300);
        let reads = sensor.reads.clone();
        let mut wrapped = TimeoutSensor::spawn(sensor, Duration::from_millis(10)).unwrap();

        for _ in 0..5 {
            assert_eq!(wrapped.read(), Err(SensorFault::Timeout));
        }

        // Only the first request reached the worker
        thread::sleep(Duration::from_millis(450));
        assert_eq!(reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cleanup_stops_worker() {
        let (sensor, cleaned) = slow(0);
        let mut wrapped = TimeoutSensor::spawn(sensor, Duration::from_secs(1)).unwrap();
        wrapped.read().unwrap();
        wrapped.cleanup();

        assert!(cleaned.load(Ordering::SeqCst));
        assert_eq!(wrapped.read(), Err(SensorFault::Bus));
    }
}
