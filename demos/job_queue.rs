/// Work queue that coalesces duplicate jobs while they are still pending
use std::thread;
use std::time::Duration;
use uniquepool::{QueueError, RPQueue, UniqueQueueBuilder};

fn main() {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    // at most 4 pending jobs, producers wait when it is full
    let jobs = UniqueQueueBuilder::<&str>::new().capacity(4).build_arc().expect("valid capacity");

    let mut workers = Vec::new();
    for worker in 0..2 {
        let jobs = jobs.clone();
        workers.push(thread::spawn(move || loop {
            match jobs.take() {
                Ok(job) => {
                    println!("worker {} rebuilding thumbnail {}", worker, job);
                    thread::sleep(Duration::from_millis(50));
                }
                Err(QueueError::Closed) => return,
                Err(err) => panic!("worker {} failed: {}", worker, err),
            }
        }));
    }

    // the same image is edited several times in a row, only one rebuild is queued while it is pending
    for image in vec!["cat.png", "cat.png", "dog.png", "cat.png", "bird.png", "dog.png"] {
        match jobs.put(image) {
            Ok(true) => println!("queued {}", image),
            Ok(false) => println!("{} is already pending", image),
            Err(err) => println!("could not queue {}: {}", image, err),
        }
    }

    // let the workers finish what is pending
    while !jobs.is_empty() {
        thread::sleep(Duration::from_millis(10));
    }
    jobs.close();

    for worker in workers {
        let _ignored = worker.join();
    }
}
