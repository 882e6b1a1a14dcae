//! Simulated Bluetooth adapter
//!
//! Stands in for a platform Bluetooth stack. The adapter and its devices are
//! [`DynamicObject`]s; every state change and every async result goes
//! through the [`Scheduler`], so listeners only ever run between driver
//! commands.

pub mod interfaces;
pub mod scheduler;

pub use interfaces::{
    bluetooth_modules, register_classes, BluetoothModules, ADAPTER_CLASS, DEVICE_CLASS,
};
pub use scheduler::{Scheduler, SimMessage};

use std::cell::{OnceCell, RefCell};
use std::rc::{Rc, Weak};
use std::time::Duration;

use bth_app::config::SimSettings;
use bth_core::prelude::*;
use bth_core::{
    AsyncRequest, DynamicObject, ErrorObject, ErrorRecord, Exception, Promise, Value,
};

pub const ADAPTER_ADDRESS: &str = "00:1A:7D:DA:71:13";
const ATTRIBUTE_CHANGED: &str = "attributechanged";

/// Late-bound handle to the object a method is defined on.
#[derive(Clone, Default)]
struct SelfHandle(Rc<OnceCell<Weak<DynamicObject>>>);

impl SelfHandle {
    fn bind(&self, object: &Rc<DynamicObject>) {
        if self.0.set(Rc::downgrade(object)).is_err() {
            warn!("simulated object bound twice");
        }
    }

    fn get(&self) -> Option<Rc<DynamicObject>> {
        self.0.get().and_then(Weak::upgrade)
    }
}

fn error_value(name: &str, message: &str) -> Value {
    Value::Object(Rc::new(ErrorObject::new(ErrorRecord::new(name, message))))
}

/// Update `attr` and announce it, if the value actually changed.
fn change_attribute(object: &DynamicObject, attr: &str, value: Value) {
    if object.value(attr) == value {
        return;
    }
    object.update(attr, value);
    object.fire(ATTRIBUTE_CHANGED, &Value::string(attr));
}

/// Device address for the `index`-th simulated device.
pub fn device_address(index: usize) -> String {
    format!("5C:F3:70:00:00:{:02X}", index % 256)
}

/// Build one simulated device.
pub fn create_device(
    name: &str,
    address: &str,
    scheduler: &Scheduler,
    connect_delay: Duration,
) -> Rc<DynamicObject> {
    let handle = SelfHandle::default();

    let pair = {
        let (handle, scheduler) = (handle.clone(), scheduler.clone());
        move |_: &DynamicObject, _: &[Value]| {
            let promise = Promise::new();
            let (handle, settled) = (handle.clone(), promise.clone());
            scheduler.after(connect_delay, move || {
                if let Some(device) = handle.get() {
                    change_attribute(&device, "paired", Value::Bool(true));
                }
                settled.resolve(Value::Undefined);
            });
            Ok(Value::Object(promise))
        }
    };

    let connect_gatt = {
        let (handle, scheduler) = (handle.clone(), scheduler.clone());
        move |_: &DynamicObject, _: &[Value]| {
            let request = AsyncRequest::new();
            let (handle, settled) = (handle.clone(), request.clone());
            scheduler.after(connect_delay, move || {
                let Some(device) = handle.get() else {
                    settled.fire_error(error_value("NetworkError", "device is gone"));
                    return;
                };
                if device.value("paired") != Value::Bool(true) {
                    settled.fire_error(error_value("NotPairedError", "device is not paired"));
                    return;
                }
                change_attribute(&device, "connected", Value::Bool(true));
                settled.fire_success(Value::Bool(true));
            });
            Ok(Value::Object(request))
        }
    };

    let device = DynamicObject::builder(DEVICE_CLASS)
        .attribute("address", address)
        .attribute("name", name)
        .attribute("paired", false)
        .attribute("connected", false)
        .method("pair", pair)
        .method("connectGatt", connect_gatt)
        .build();
    handle.bind(&device);
    device
}

/// The simulated adapter together with the devices it can discover.
pub struct Simulator {
    adapter: Rc<DynamicObject>,
    devices: Rc<RefCell<Vec<Rc<DynamicObject>>>>,
    scheduler: Scheduler,
    settings: SimSettings,
}

impl Simulator {
    pub fn new(settings: &SimSettings, scheduler: Scheduler) -> Self {
        let connect_delay = Duration::from_millis(settings.connect_delay_ms);
        let devices: Vec<Rc<DynamicObject>> = (0..settings.device_count)
            .map(|i| {
                create_device(
                    &format!("sim-device-{}", i),
                    &device_address(i),
                    &scheduler,
                    connect_delay,
                )
            })
            .collect();
        let devices = Rc::new(RefCell::new(devices));
        let adapter = build_adapter(settings, &scheduler, &devices);
        info!(
            "simulated adapter {} with {} device(s)",
            ADAPTER_ADDRESS, settings.device_count
        );
        Self {
            adapter,
            devices,
            scheduler,
            settings: settings.clone(),
        }
    }

    pub fn adapter(&self) -> &Rc<DynamicObject> {
        &self.adapter
    }

    pub fn adapter_value(&self) -> Value {
        Value::Object(self.adapter.clone())
    }

    pub fn devices(&self) -> Vec<Rc<DynamicObject>> {
        self.devices.borrow().clone()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Create a device that later discoveries will report.
    pub fn add_device(&self, name: &str, address: &str) -> Rc<DynamicObject> {
        let device = create_device(
            name,
            address,
            &self.scheduler,
            Duration::from_millis(self.settings.connect_delay_ms),
        );
        self.devices.borrow_mut().push(device.clone());
        debug!("added simulated device {} ({})", name, address);
        device
    }
}

fn build_adapter(
    settings: &SimSettings,
    scheduler: &Scheduler,
    devices: &Rc<RefCell<Vec<Rc<DynamicObject>>>>,
) -> Rc<DynamicObject> {
    let handle = SelfHandle::default();
    let discovery_delay = Duration::from_millis(settings.discovery_delay_ms);
    let connect_delay = Duration::from_millis(settings.connect_delay_ms);

    let start_discovery = {
        let (handle, scheduler) = (handle.clone(), scheduler.clone());
        let devices = Rc::downgrade(devices);
        move |adapter: &DynamicObject, _: &[Value]| {
            if adapter.value("enabled") != Value::Bool(true) {
                return Err(Exception::error("InvalidStateError", "adapter is disabled"));
            }
            let request = AsyncRequest::new();
            let started = handle.clone();
            scheduler.after(Duration::ZERO, move || {
                if let Some(adapter) = started.get() {
                    change_attribute(&adapter, "discovering", Value::Bool(true));
                }
            });
            let (handle, devices, settled) = (handle.clone(), devices.clone(), request.clone());
            scheduler.after(discovery_delay, move || {
                let Some(adapter) = handle.get() else {
                    settled.fire_error(error_value("NetworkError", "adapter is gone"));
                    return;
                };
                let found = devices
                    .upgrade()
                    .map(|devices| devices.borrow().clone())
                    .unwrap_or_default();
                for device in found {
                    adapter.fire("devicefound", &Value::Object(device));
                }
                change_attribute(&adapter, "discovering", Value::Bool(false));
                settled.fire_success(Value::Undefined);
            });
            Ok(Value::Object(request))
        }
    };

    let stop_discovery = {
        let (handle, scheduler) = (handle.clone(), scheduler.clone());
        move |_: &DynamicObject, _: &[Value]| {
            let request = AsyncRequest::new();
            let (handle, settled) = (handle.clone(), request.clone());
            scheduler.after(Duration::ZERO, move || {
                if let Some(adapter) = handle.get() {
                    change_attribute(&adapter, "discovering", Value::Bool(false));
                }
                settled.fire_success(Value::Undefined);
            });
            Ok(Value::Object(request))
        }
    };

    let get_paired_devices = {
        let scheduler = scheduler.clone();
        let devices = Rc::downgrade(devices);
        move |_: &DynamicObject, _: &[Value]| {
            let promise = Promise::new();
            let (devices, settled) = (devices.clone(), promise.clone());
            scheduler.after(connect_delay, move || {
                let paired: Vec<Value> = devices
                    .upgrade()
                    .map(|devices| devices.borrow().clone())
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|device| device.value("paired") == Value::Bool(true))
                    .map(|device| Value::Object(device))
                    .collect();
                settled.resolve(Value::list(paired));
            });
            Ok(Value::Object(promise))
        }
    };

    let adapter = DynamicObject::builder(ADAPTER_CLASS)
        .writable("name", "btharness-sim")
        .attribute("address", ADAPTER_ADDRESS)
        .writable("enabled", true)
        .writable("discoverable", false)
        .attribute("discovering", false)
        .method("startDiscovery", start_discovery)
        .method("stopDiscovery", stop_discovery)
        .method("getPairedDevices", get_paired_devices)
        .build();
    handle.bind(&adapter);
    adapter
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn settings() -> SimSettings {
        SimSettings {
            discovery_delay_ms: 1,
            connect_delay_ms: 1,
            device_count: 2,
        }
    }

    async fn drain(scheduler: &Scheduler, rx: &mut UnboundedReceiver<SimMessage>) {
        while scheduler.pending() > 0 {
            let message = rx.recv().await.unwrap();
            scheduler.handle(message);
        }
    }

    #[tokio::test]
    async fn test_discovery_reports_every_device() {
        let (scheduler, mut rx) = Scheduler::new();
        let sim = Simulator::new(&settings(), scheduler.clone());
        let found = Rc::new(RefCell::new(Vec::new()));
        let sink = found.clone();
        let _guard = bth_core::ListenerGuard::new(
            &(sim.adapter().clone() as bth_core::ObjectRef),
            "devicefound",
            Rc::new(move |device: &Value| sink.borrow_mut().push(device.clone())),
        );

        let request = sim.adapter_value().call_method("startDiscovery", &[]).unwrap();
        drain(&scheduler, &mut rx).await;

        assert_eq!(found.borrow().len(), 2);
        let request = request.downcast_object::<AsyncRequest>().unwrap();
        assert_eq!(request.ready_state(), bth_core::ReadyState::Done);
        assert_eq!(sim.adapter().value("discovering"), Value::Bool(false));
    }

    #[tokio::test]
    async fn test_disabled_adapter_throws() {
        let (scheduler, _rx) = Scheduler::new();
        let sim = Simulator::new(&settings(), scheduler.clone());
        sim.adapter_value()
            .set_attr("enabled", Value::Bool(false))
            .unwrap();
        let err = sim
            .adapter_value()
            .call_method("startDiscovery", &[])
            .unwrap_err();
        assert_eq!(err.record().unwrap().name, "InvalidStateError");
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test]
    async fn test_pair_then_connect() {
        let (scheduler, mut rx) = Scheduler::new();
        let sim = Simulator::new(&settings(), scheduler.clone());
        let device = Value::Object(sim.devices()[0].clone());

        let early = device.call_method("connectGatt", &[]).unwrap();
        drain(&scheduler, &mut rx).await;
        assert_eq!(early.get_attr("readyState"), Some(Value::from("done")));
        assert!(early
            .get_attr("error")
            .is_some_and(|error| error.as_object().is_some()));

        device.call_method("pair", &[]).unwrap();
        drain(&scheduler, &mut rx).await;
        assert_eq!(device.get_attr("paired"), Some(Value::Bool(true)));

        device.call_method("connectGatt", &[]).unwrap();
        drain(&scheduler, &mut rx).await;
        assert_eq!(device.get_attr("connected"), Some(Value::Bool(true)));

        let paired = sim
            .adapter_value()
            .call_method("getPairedDevices", &[])
            .unwrap();
        drain(&scheduler, &mut rx).await;
        let paired = paired.downcast_object::<Promise>().unwrap();
        assert_eq!(paired.outcome().get_attr("length"), Some(Value::from(1)));
    }

    #[tokio::test]
    async fn test_added_device_is_discovered() {
        let (scheduler, mut rx) = Scheduler::new();
        let sim = Simulator::new(&settings(), scheduler.clone());
        sim.add_device("extra", "AA:BB:CC:DD:EE:FF");
        assert_eq!(sim.devices().len(), 3);

        let count = Rc::new(std::cell::Cell::new(0));
        let counter = count.clone();
        let _guard = bth_core::ListenerGuard::new(
            &(sim.adapter().clone() as bth_core::ObjectRef),
            "devicefound",
            Rc::new(move |_: &Value| counter.set(counter.get() + 1)),
        );
        sim.adapter_value().call_method("startDiscovery", &[]).unwrap();
        drain(&scheduler, &mut rx).await;
        assert_eq!(count.get(), 3);
    }
}
