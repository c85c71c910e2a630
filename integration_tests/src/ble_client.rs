//! BLE client for the bridge's text channel service.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use btleplug::api::{
    Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::time::timeout;
use uuid::Uuid;

/// Text channel service and its single characteristic
pub const TEXT_SERVICE_UUID: Uuid = Uuid::from_u128(0xbc2f4cc6_aaef_4351_9034_d66268e328f0);
const TEXT_CHAR_UUID: Uuid = Uuid::from_u128(0x06d1e5e7_79ad_4a71_8faa_373789f7d93c);

/// Strip the zero padding the firmware adds to fixed-size values
fn trim_padding(value: &[u8]) -> Vec<u8> {
    let end = value.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    value[..end].to_vec()
}

/// BLE client connected to one bridge.
pub struct BleClient {
    peripheral: Peripheral,
    text_char: Characteristic,
    /// Notifications received and not yet consumed, padding removed
    notifications: Arc<Mutex<VecDeque<Vec<u8>>>>,
}

impl BleClient {
    /// Scan for a device by name and connect.
    pub async fn connect_by_name(name: &str, scan_timeout: Duration) -> Result<Self> {
        let manager = Manager::new().await?;
        let adapters = manager.adapters().await?;
        let adapter = adapters
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No Bluetooth adapters found"))?;

        adapter.start_scan(ScanFilter::default()).await?;
        let peripheral = Self::find_device_by_name(&adapter, name, scan_timeout).await?;
        adapter.stop_scan().await?;

        peripheral.connect().await?;
        peripheral.discover_services().await?;

        let text_char = peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == TEXT_CHAR_UUID && c.service_uuid == TEXT_SERVICE_UUID)
            .ok_or_else(|| anyhow!("Text characteristic not found"))?;

        peripheral.subscribe(&text_char).await?;

        let notifications = Arc::new(Mutex::new(VecDeque::new()));

        let queue = notifications.clone();
        let peripheral_clone = peripheral.clone();
        tokio::spawn(async move {
            let mut stream = match peripheral_clone.notifications().await {
                Ok(s) => s,
                Err(_) => return,
            };

            while let Some(data) = stream.next().await {
                if data.uuid == TEXT_CHAR_UUID {
                    queue.lock().await.push_back(trim_padding(&data.value));
                }
            }
        });

        Ok(Self {
            peripheral,
            text_char,
            notifications,
        })
    }

    /// Find a device by name within the scan timeout.
    async fn find_device_by_name(
        adapter: &Adapter,
        name: &str,
        scan_timeout: Duration,
    ) -> Result<Peripheral> {
        let start = std::time::Instant::now();

        while start.elapsed() < scan_timeout {
            for peripheral in adapter.peripherals().await? {
                if let Some(props) = peripheral.properties().await? {
                    if props.local_name.as_deref() == Some(name) {
                        return Ok(peripheral);
                    }
                }
            }

            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        Err(anyhow!("Device '{}' not found within timeout", name))
    }

    /// Wait for the next notification on the text characteristic.
    pub async fn wait_for_notification(&self, wait: Duration) -> Result<Vec<u8>> {
        let result = timeout(wait, async {
            loop {
                if let Some(value) = self.notifications.lock().await.pop_front() {
                    return value;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;

        result.map_err(|_| anyhow!("Timeout waiting for BLE notification"))
    }

    /// Read the current value of the text characteristic.
    pub async fn read_text(&self) -> Result<Vec<u8>> {
        let value = self.peripheral.read(&self.text_char).await?;
        Ok(trim_padding(&value))
    }

    /// Write to the text characteristic as a central would.
    pub async fn write_text(&self, data: &[u8]) -> Result<()> {
        self.peripheral
            .write(&self.text_char, data, WriteType::WithResponse)
            .await?;
        Ok(())
    }

    /// Whether the device advertises the text service.
    pub async fn advertises_text_service(&self) -> Result<bool> {
        let props = self.peripheral.properties().await?;
        Ok(props.is_some_and(|p| p.services.contains(&TEXT_SERVICE_UUID)))
    }

    /// Disconnect from the device.
    pub async fn disconnect(&self) -> Result<()> {
        self.peripheral.unsubscribe(&self.text_char).await?;
        self.peripheral.disconnect().await?;
        Ok(())
    }

    /// Drop any notifications not yet consumed.
    pub async fn clear_buffer(&self) {
        self.notifications.lock().await.clear();
    }
}
