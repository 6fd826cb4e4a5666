use bytes::BytesMut;
use nvprims_nv::{NvList, NvListHeader, PackOptions, NVLIST_HEADER_SIZE};
use nvprims_transport::DescriptorChannel;
use tracing::debug;

use crate::config::MsgConfig;
use crate::error::{MsgError, Result};

/// Send `nvl` with the default limits.
pub fn send<C: DescriptorChannel + ?Sized>(channel: &mut C, nvl: &NvList) -> Result<()> {
    send_with_config(channel, nvl, &MsgConfig::default())
}

/// Pack `nvl` and write it, then its descriptors if it holds any.
///
/// A list with a sticky error is not sent; the error is returned.
pub fn send_with_config<C: DescriptorChannel + ?Sized>(
    channel: &mut C,
    nvl: &NvList,
    config: &MsgConfig,
) -> Result<()> {
    let packed = nvl.pack_with_descriptors(PackOptions::default())?;
    check_limits(
        packed.data.len() as u64,
        packed.descriptors.len() as u64,
        config,
    )?;

    channel.send_buf(&packed.data)?;
    if !packed.descriptors.is_empty() {
        channel.send_descriptors(&packed.descriptors)?;
    }
    debug!(
        size = packed.data.len(),
        descriptors = packed.descriptors.len(),
        "sent nvlist"
    );
    Ok(())
}

/// Receive one list with the default limits.
pub fn recv<C: DescriptorChannel + ?Sized>(channel: &mut C) -> Result<NvList> {
    recv_with_config(channel, &MsgConfig::default())
}

/// Read a packed list and its descriptors, then unpack it.
///
/// The header is read first to learn the message length and descriptor
/// count. A list that unpacks with a sticky error is reported as that error.
pub fn recv_with_config<C: DescriptorChannel + ?Sized>(
    channel: &mut C,
    config: &MsgConfig,
) -> Result<NvList> {
    let mut head = [0u8; NVLIST_HEADER_SIZE];
    channel.recv_buf(&mut head)?;
    let header = NvListHeader::parse(&head)?;
    let total = header.total_size();
    check_limits(total, header.descriptors, config)?;

    // bounded by max_message_size above
    let mut buf = BytesMut::zeroed(total as usize);
    buf[..NVLIST_HEADER_SIZE].copy_from_slice(&head);
    channel.recv_buf(&mut buf[NVLIST_HEADER_SIZE..])?;

    let fds = if header.descriptors > 0 {
        channel.recv_descriptors(header.descriptors as usize)?
    } else {
        Vec::new()
    };

    let nvl = NvList::unpack_with_descriptors(&buf, fds)?;
    if let Some(err) = nvl.error() {
        return Err(MsgError::Nv(err.clone()));
    }
    debug!(size = total, descriptors = header.descriptors, "received nvlist");
    Ok(nvl)
}

/// Send `nvl`, then wait for the reply. `nvl` is consumed either way.
pub fn xfer<C: DescriptorChannel + ?Sized>(channel: &mut C, nvl: NvList) -> Result<NvList> {
    xfer_with_config(channel, nvl, &MsgConfig::default())
}

pub fn xfer_with_config<C: DescriptorChannel + ?Sized>(
    channel: &mut C,
    nvl: NvList,
    config: &MsgConfig,
) -> Result<NvList> {
    send_with_config(channel, &nvl, config)?;
    drop(nvl);
    recv_with_config(channel, config)
}

fn check_limits(size: u64, descriptors: u64, config: &MsgConfig) -> Result<()> {
    if size > config.max_message_size as u64 {
        return Err(MsgError::MessageTooLarge {
            size,
            max: config.max_message_size,
        });
    }
    if descriptors > config.max_descriptors as u64 {
        return Err(MsgError::TooManyDescriptors {
            count: descriptors,
            max: config.max_descriptors,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use nvprims_transport::IpcStream;

    use super::*;

    #[test]
    fn round_trip_over_socketpair() {
        let (mut a, mut b) = IpcStream::pair().unwrap();
        let mut nvl = NvList::new();
        nvl.add_string("driver", "ixl");
        nvl.add_number("num_vfs", 4);

        send(&mut a, &nvl).unwrap();
        let got = recv(&mut b).unwrap();
        assert_eq!(got.get_string("driver"), "ixl");
        assert_eq!(got.get_number("num_vfs"), 4);
    }

    #[test]
    fn limits_are_checked_before_reading_body() {
        let config = MsgConfig {
            max_message_size: 32,
            ..MsgConfig::default()
        };
        assert!(check_limits(32, 0, &config).is_ok());
        assert!(matches!(
            check_limits(33, 0, &config),
            Err(MsgError::MessageTooLarge { size: 33, max: 32 })
        ));
        assert!(matches!(
            check_limits(0, 254, &config),
            Err(MsgError::TooManyDescriptors { count: 254, .. })
        ));
    }
}
