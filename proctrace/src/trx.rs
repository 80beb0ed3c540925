use crate::event::LifecycleEvent;
use crate::Result;
use flume::{Receiver, Sender};

#[derive(Clone)]
pub struct EventTx {
	tx: Sender<LifecycleEvent>,
}

impl EventTx {
	pub async fn send(&self, item: LifecycleEvent) -> Result<()> {
		match self.tx.send_async(item).await {
			Ok(_) => Ok(()),
			Err(ex) => Err(ex.into()),
		}
	}
}

pub struct EventRx {
	rx: Receiver<LifecycleEvent>,
}

impl EventRx {
	pub async fn recv(&self) -> Result<LifecycleEvent> {
		let res = self.rx.recv_async().await?;
		Ok(res)
	}
}

pub fn new_trx_pair() -> (EventTx, EventRx) {
	let (tx, rx) = flume::unbounded::<LifecycleEvent>();

	let evt_tx = EventTx { tx };

	let evt_rx = EventRx { rx };

	(evt_tx, evt_rx)
}
