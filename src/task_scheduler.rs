use std::{
    thread,
    sync::{Arc, Mutex, MutexGuard},
    time::{Duration, Instant},
};
use threadpool::ThreadPool;


/// A job returns how long to wait before it runs again.
pub type FnTask = dyn Fn() -> Duration + Send + 'static;


pub struct Task {
    name: &'static str,
    job: Arc<Mutex<FnTask>>,
    next_time: Instant,
    running: bool,
}

impl Task {
    pub fn new<F>(name: &'static str, job: F, delay: Duration) -> Self where
        F: Fn() -> Duration + Send + 'static {

        Task {
            name,
            job: Arc::new(Mutex::new(job)),
            next_time: Instant::now() + delay,
            running: false,
        }
    }

    fn ready(&self) -> bool {
        !self.running && Instant::now() >= self.next_time
    }

    fn finish_job(&mut self, result: Duration) {
        self.next_time = Instant::now() + result;
        self.running = false;
    }

    fn mark_as_busy(&mut self) {
        self.running = true;
    }

    fn get_job(&self) -> Arc<Mutex<FnTask>> {
        self.job.clone()
    }
}


pub struct TaskSchedulerBuilder {
    tasks: Vec<Arc<Mutex<Task>>>,
    n_workers: usize,
    period_resolution: Duration,
}

impl TaskSchedulerBuilder {
    pub fn new() -> Self {
        TaskSchedulerBuilder {
            tasks: Vec::new(),
            n_workers: 2,
            period_resolution: Duration::new(1, 0),
        }
    }

    pub fn n_workers(mut self, cnt: usize) -> Self {
        self.n_workers = cnt;
        self
    }

    pub fn period_resolution(mut self, period: Duration) -> Self {
        self.period_resolution = period;
        self
    }

    pub fn add_task(&mut self, task: Task) {
        debug!("Scheduled task '{}'", task.name);
        self.tasks.push(Arc::new(Mutex::new(task)));
    }

    pub fn build(self) -> TaskScheduler {
        TaskScheduler::new(self)
    }
}


pub struct TaskScheduler {
    scheduler: Option<thread::JoinHandle<()>>,
    running: Arc<Mutex<bool>>,
}

impl TaskScheduler {
    fn new(builder: TaskSchedulerBuilder) -> Self {
        let tasks = builder.tasks;
        let n_workers = builder.n_workers.max(1);
        let period_resolution = builder.period_resolution;

        let t_running = Arc::new(Mutex::new(true));
        let running = t_running.clone();

        let scheduler_job = move || {
            let pool = ThreadPool::new(n_workers);

            while *lock(&running) {
                for m_task in &tasks {
                    let mut task = lock(m_task);

                    if task.ready() {
                        task.mark_as_busy();

                        let job = task.get_job();
                        let t_task = m_task.clone();
                        pool.execute(move || {
                            let next_period = (*lock(&job))();
                            lock(&t_task).finish_job(next_period);
                        });
                    }
                }

                thread::sleep(period_resolution);
            }

            pool.join();
        };

        TaskScheduler {
            scheduler: Some(thread::spawn(scheduler_job)),
            running: t_running,
        }
    }

    pub fn join(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        *lock(&self.running) = false;

        if let Some(scheduler) = self.scheduler.take() {
            if scheduler.join().is_err() {
                error!("Task scheduler thread panicked");
            }
        }
    }
}

impl Drop for TaskScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn lock<T: ?Sized>(m: &Mutex<T>) -> MutexGuard<T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn task_repeats_until_join() {
        let runs = Arc::new(AtomicUsize::new(0));
        let t_runs = runs.clone();

        let mut builder = TaskSchedulerBuilder::new()
            .period_resolution(Duration::from_millis(5));
        builder.add_task(Task::new("count", move || {
            t_runs.fetch_add(1, Ordering::SeqCst);
            Duration::from_millis(5)
        }, Duration::from_millis(0)));

        let scheduler = builder.build();

        let deadline = Instant::now() + Duration::from_secs(5);
        while runs.load(Ordering::SeqCst) < 3 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        scheduler.join();

        assert!(runs.load(Ordering::SeqCst) >= 3);
    }
}
