use async_trait::async_trait;
use btleplug::{
    api::{
        Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter,
        WriteType,
    },
    platform::{Adapter, Manager, Peripheral, PeripheralId},
};
use bytes::Bytes;
use futures::{
    stream::{self, BoxStream, StreamExt},
    Future, Stream,
};
use std::time::Duration;
use tokio::{sync::mpsc, time::timeout};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    error::{Result, RideError},
    types::ControllerInfo,
    ACCEPTED_SERVICE_UUIDS,
};

/// A GATT service as seen after discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattService {
    /// Service UUID
    pub uuid: Uuid,
    /// UUIDs of the characteristics exposed by this service
    pub characteristics: Vec<Uuid>,
}

impl GattService {
    /// Check if the service exposes a characteristic
    #[must_use]
    pub fn has_characteristic(&self, uuid: Uuid) -> bool {
        self.characteristics.contains(&uuid)
    }
}

/// Transport link to one controller
#[async_trait]
pub trait ControllerLink: Send + Sync {
    /// Controller identity captured at discovery time
    fn info(&self) -> &ControllerInfo;

    /// Open the transport connection
    async fn connect(&self) -> Result<()>;

    /// Enumerate services and their characteristics
    async fn discover_services(&self) -> Result<Vec<GattService>>;

    /// Write to a characteristic without waiting for a response
    async fn write_without_response(&self, characteristic: Uuid, data: &[u8]) -> Result<()>;

    /// Register for notifications and return the frame queue
    ///
    /// Frames are delivered in arrival order through a bounded channel of
    /// `capacity` entries. The channel closes when the notification stream
    /// ends.
    async fn subscribe(&self, characteristic: Uuid, capacity: usize)
        -> Result<mpsc::Receiver<Bytes>>;

    /// Check if the link is still up
    async fn is_connected(&self) -> bool;

    /// Close the transport connection
    async fn disconnect(&self) -> Result<()>;
}

/// Source of controller links
#[async_trait]
pub trait Scanner: Send + Sync {
    /// Link type produced by this scanner
    type Link: ControllerLink;

    /// Scan until a controller advertising an accepted service is found
    ///
    /// Stops early on the first match. Returns [`RideError::ScanTimeout`]
    /// when nothing matches within `scan_timeout`.
    async fn scan(&self, scan_timeout: Duration) -> Result<Self::Link>;
}

/// btleplug backed scanner
pub struct BleScanner {
    manager: Manager,
}

impl BleScanner {
    /// Create a new BLE scanner
    ///
    /// # Errors
    ///
    /// Returns [`RideError::Ble`] if the Bluetooth stack cannot be initialized.
    pub async fn new() -> Result<Self> {
        let manager = Manager::new().await?;
        Ok(Self { manager })
    }

    async fn adapter(&self) -> Result<Adapter> {
        self.manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or(RideError::AdapterNotFound)
    }

    /// Check peripherals cached by earlier scans, then newly advertised ones
    async fn find_controller<E>(central: &Adapter, events: E) -> Result<Option<Peripheral>>
    where
        E: Stream<Item = CentralEvent> + Send,
    {
        let cached = stream::iter(central.peripherals().await?);
        let discovered: BoxStream<'_, Peripheral> = events
            .filter_map(|event| async move {
                let id = advertised_peripheral(event)?;
                central.peripheral(&id).await.ok()
            })
            .boxed();

        let found = first_match(cached.chain(discovered), |peripheral| {
            let peripheral = peripheral.clone();
            async move { advertises_controller(&peripheral).await }
        })
        .await;

        Ok(found)
    }
}

#[async_trait]
impl Scanner for BleScanner {
    type Link = BleLink;

    async fn scan(&self, scan_timeout: Duration) -> Result<BleLink> {
        info!("Scanning for controllers ({}s)...", scan_timeout.as_secs());

        let central = self.adapter().await?;
        let scan_filter = ScanFilter {
            services: ACCEPTED_SERVICE_UUIDS.to_vec(),
        };
        // Subscribe first so no discovery event is missed once the scan runs
        let events = central.events().await?;
        central.start_scan(scan_filter).await?;

        let found = timeout(scan_timeout, Self::find_controller(&central, events)).await;

        if let Err(e) = central.stop_scan().await {
            warn!("Failed to stop scan: {}", e);
        }

        let peripheral = match found {
            Ok(Ok(Some(peripheral))) => peripheral,
            Ok(Ok(None)) | Err(_) => {
                return Err(RideError::ScanTimeout {
                    timeout_ms: u64::try_from(scan_timeout.as_millis()).unwrap_or(u64::MAX),
                })
            }
            Ok(Err(e)) => return Err(e),
        };

        let info = extract_controller_info(&peripheral).await;
        info!("Found controller: {} [{}]", info.name, info.address);
        Ok(BleLink { peripheral, info })
    }
}

/// Peripheral an event reports advertisement data for
fn advertised_peripheral(event: CentralEvent) -> Option<PeripheralId> {
    match event {
        CentralEvent::DeviceDiscovered(id)
        | CentralEvent::DeviceUpdated(id)
        | CentralEvent::ServicesAdvertisement { id, .. } => Some(id),
        _ => None,
    }
}

/// First candidate accepted by `accept`, stopping as soon as one matches
async fn first_match<S, F, Fut>(candidates: S, accept: F) -> Option<S::Item>
where
    S: Stream,
    F: Fn(&S::Item) -> Fut,
    Fut: Future<Output = bool>,
{
    futures::pin_mut!(candidates);

    while let Some(candidate) = candidates.next().await {
        if accept(&candidate).await {
            return Some(candidate);
        }
    }

    None
}

/// Check if the advertisement carries one of the accepted service UUIDs
async fn advertises_controller(peripheral: &Peripheral) -> bool {
    if let Ok(Some(properties)) = peripheral.properties().await {
        return properties
            .services
            .iter()
            .any(|uuid| ACCEPTED_SERVICE_UUIDS.contains(uuid));
    }

    false
}

/// Extract controller information from BLE properties
async fn extract_controller_info(peripheral: &Peripheral) -> ControllerInfo {
    let address = peripheral.address().to_string();

    if let Ok(Some(properties)) = peripheral.properties().await {
        let name = properties
            .local_name
            .unwrap_or_else(|| "Unknown controller".to_string());

        ControllerInfo {
            name,
            address,
            rssi: properties.rssi,
        }
    } else {
        ControllerInfo::new("Unknown controller".to_string(), address)
    }
}

/// btleplug backed controller link
pub struct BleLink {
    peripheral: Peripheral,
    info: ControllerInfo,
}

impl BleLink {
    fn characteristic(&self, uuid: Uuid) -> Result<Characteristic> {
        self.peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == uuid)
            .ok_or(RideError::CharacteristicNotFound { uuid })
    }
}

#[async_trait]
impl ControllerLink for BleLink {
    fn info(&self) -> &ControllerInfo {
        &self.info
    }

    async fn connect(&self) -> Result<()> {
        info!("Connecting to controller: {}", self.info.name);
        self.peripheral
            .connect()
            .await
            .map_err(|e| RideError::TransportConnect(e.to_string()))
    }

    async fn discover_services(&self) -> Result<Vec<GattService>> {
        self.peripheral.discover_services().await?;

        let services = self
            .peripheral
            .services()
            .into_iter()
            .map(|service| GattService {
                uuid: service.uuid,
                characteristics: service.characteristics.iter().map(|c| c.uuid).collect(),
            })
            .collect();

        Ok(services)
    }

    async fn write_without_response(&self, characteristic: Uuid, data: &[u8]) -> Result<()> {
        let characteristic = self.characteristic(characteristic)?;
        debug!("Writing {:02X?} to {}", data, characteristic.uuid);

        self.peripheral
            .write(&characteristic, data, WriteType::WithoutResponse)
            .await?;

        Ok(())
    }

    async fn subscribe(
        &self,
        characteristic: Uuid,
        capacity: usize,
    ) -> Result<mpsc::Receiver<Bytes>> {
        let characteristic = self.characteristic(characteristic)?;

        self.peripheral
            .subscribe(&characteristic)
            .await
            .map_err(|e| RideError::SubscriptionFailed(e.to_string()))?;

        let notification_stream = self
            .peripheral
            .notifications()
            .await
            .map_err(|e| RideError::SubscriptionFailed(e.to_string()))?;

        let (sender, receiver) = mpsc::channel(capacity.max(1));
        tokio::spawn(forward_notifications(
            notification_stream,
            characteristic.uuid,
            sender,
        ));

        Ok(receiver)
    }

    async fn is_connected(&self) -> bool {
        self.peripheral.is_connected().await.unwrap_or(false)
    }

    async fn disconnect(&self) -> Result<()> {
        self.peripheral.disconnect().await?;
        Ok(())
    }
}

/// Push notification values for one characteristic into the frame queue
async fn forward_notifications<S>(mut notification_stream: S, uuid: Uuid, sender: mpsc::Sender<Bytes>)
where
    S: Stream<Item = btleplug::api::ValueNotification> + Unpin,
{
    while let Some(notification) = notification_stream.next().await {
        if notification.uuid != uuid {
            continue;
        }

        if sender.send(Bytes::from(notification.value)).await.is_err() {
            break;
        }
    }

    debug!("Notification stream for {} ended", uuid);
}
