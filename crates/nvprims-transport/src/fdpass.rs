//! Descriptor passing over Unix domain sockets (`SCM_RIGHTS`).
//!
//! Each control message rides on a single dummy byte so that the receiver can
//! pair it with exactly one `recvmsg(2)` call. Large arrays are split into
//! batches of [`MAX_DESCRIPTORS_PER_MESSAGE`].

use std::io::ErrorKind;
use std::mem::size_of;
use std::os::fd::{AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};

use tracing::{debug, trace};

use crate::error::{Result, TransportError};

/// Maximum number of descriptors carried by one control message.
pub const MAX_DESCRIPTORS_PER_MESSAGE: usize = 64;

/// Send every descriptor in `fds` over `socket`, in order.
pub fn send_descriptors(socket: BorrowedFd<'_>, fds: &[BorrowedFd<'_>]) -> Result<()> {
    for chunk in fds.chunks(MAX_DESCRIPTORS_PER_MESSAGE) {
        send_batch(socket, chunk)?;
    }
    debug!(count = fds.len(), "sent descriptors");
    Ok(())
}

/// Receive exactly `count` descriptors from `socket`, in the order they were sent.
///
/// Received descriptors are close-on-exec. On failure every descriptor
/// received so far is closed.
pub fn recv_descriptors(socket: BorrowedFd<'_>, count: usize) -> Result<Vec<OwnedFd>> {
    let mut fds = Vec::with_capacity(count);
    while fds.len() < count {
        let batch = (count - fds.len()).min(MAX_DESCRIPTORS_PER_MESSAGE);
        fds.extend(recv_batch(socket, batch)?);
    }
    debug!(count, "received descriptors");
    Ok(fds)
}

/// Control buffer with the alignment `cmsghdr` requires.
fn control_buffer(payload_len: usize) -> (Vec<u64>, usize) {
    // SAFETY: CMSG_SPACE only performs arithmetic on its argument.
    let space = unsafe { libc::CMSG_SPACE(payload_len as libc::c_uint) } as usize;
    (vec![0u64; space.div_ceil(size_of::<u64>())], space)
}

fn send_batch(socket: BorrowedFd<'_>, fds: &[BorrowedFd<'_>]) -> Result<()> {
    let raw: Vec<RawFd> = fds.iter().map(|fd| fd.as_raw_fd()).collect();
    let payload_len = raw.len() * size_of::<RawFd>();
    let (mut control, space) = control_buffer(payload_len);

    let mut data = [0u8; 1];
    let mut iov = libc::iovec {
        iov_base: data.as_mut_ptr().cast::<libc::c_void>(),
        iov_len: data.len(),
    };
    // SAFETY: an all-zero msghdr is a valid empty message header.
    let mut msg: libc::msghdr = unsafe { std::mem::zeroed() };
    msg.msg_iov = &mut iov;
    msg.msg_iovlen = 1;
    msg.msg_control = control.as_mut_ptr().cast::<libc::c_void>();
    msg.msg_controllen = space as _;

    // SAFETY: `control` is aligned for cmsghdr and holds CMSG_SPACE(payload_len)
    // bytes, so the first header and its data area are in bounds.
    unsafe {
        let cmsg = libc::CMSG_FIRSTHDR(&msg);
        (*cmsg).cmsg_level = libc::SOL_SOCKET;
        (*cmsg).cmsg_type = libc::SCM_RIGHTS;
        (*cmsg).cmsg_len = libc::CMSG_LEN(payload_len as libc::c_uint) as _;
        std::ptr::copy_nonoverlapping(
            raw.as_ptr().cast::<u8>(),
            libc::CMSG_DATA(cmsg),
            payload_len,
        );
    }

    loop {
        // SAFETY: `msg` references buffers that outlive this call.
        let rc = unsafe { libc::sendmsg(socket.as_raw_fd(), &msg, 0) };
        if rc == 1 {
            trace!(count = raw.len(), "sent descriptor batch");
            return Ok(());
        }
        if rc == 0 {
            return Err(TransportError::ConnectionClosed);
        }
        let err = std::io::Error::last_os_error();
        if err.kind() == ErrorKind::Interrupted {
            continue;
        }
        return Err(TransportError::Io(err));
    }
}

fn recv_batch(socket: BorrowedFd<'_>, count: usize) -> Result<Vec<OwnedFd>> {
    let payload_len = count * size_of::<RawFd>();
    let (mut control, space) = control_buffer(payload_len);

    let mut data = [0u8; 1];
    let mut iov = libc::iovec {
        iov_base: data.as_mut_ptr().cast::<libc::c_void>(),
        iov_len: data.len(),
    };
    // SAFETY: an all-zero msghdr is a valid empty message header.
    let mut msg: libc::msghdr = unsafe { std::mem::zeroed() };
    msg.msg_iov = &mut iov;
    msg.msg_iovlen = 1;
    msg.msg_control = control.as_mut_ptr().cast::<libc::c_void>();
    msg.msg_controllen = space as _;

    #[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
    let flags = libc::MSG_CMSG_CLOEXEC;
    #[cfg(not(any(target_os = "linux", target_os = "android", target_os = "freebsd")))]
    let flags = 0;

    loop {
        // SAFETY: `msg` references buffers that outlive this call.
        let rc = unsafe { libc::recvmsg(socket.as_raw_fd(), &mut msg, flags) };
        if rc > 0 {
            break;
        }
        if rc == 0 {
            return Err(TransportError::ConnectionClosed);
        }
        let err = std::io::Error::last_os_error();
        if err.kind() == ErrorKind::Interrupted {
            continue;
        }
        return Err(TransportError::Io(err));
    }

    let mut received = Vec::with_capacity(count);
    // SAFETY: the kernel filled `control` with well-formed control messages up
    // to msg_controllen; the CMSG_* macros never step past that bound.
    unsafe {
        let mut cmsg = libc::CMSG_FIRSTHDR(&msg);
        while !cmsg.is_null() {
            if (*cmsg).cmsg_level == libc::SOL_SOCKET && (*cmsg).cmsg_type == libc::SCM_RIGHTS {
                let data_len = (*cmsg).cmsg_len as usize - libc::CMSG_LEN(0) as usize;
                let base = libc::CMSG_DATA(cmsg).cast::<RawFd>();
                for i in 0..data_len / size_of::<RawFd>() {
                    let fd = std::ptr::read_unaligned(base.add(i));
                    received.push(OwnedFd::from_raw_fd(fd));
                }
            }
            cmsg = libc::CMSG_NXTHDR(&msg, cmsg);
        }
    }

    if msg.msg_flags & libc::MSG_CTRUNC != 0 {
        return Err(TransportError::ControlTruncated);
    }
    if received.len() != count {
        return Err(TransportError::DescriptorCount {
            expected: count,
            received: received.len(),
        });
    }

    #[cfg(not(any(target_os = "linux", target_os = "android", target_os = "freebsd")))]
    for fd in &received {
        // SAFETY: `fd` is an open descriptor we own.
        unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_SETFD, libc::FD_CLOEXEC) };
    }

    trace!(count, "received descriptor batch");
    Ok(received)
}
