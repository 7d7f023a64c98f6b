/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Rank-to-rank messaging.
//!
//! [`Transport`] is the capability the distribution layer runs on: send a
//! frame to a rank, receive an expected frame from a rank, receive the next
//! result frame from whichever worker produced it. Two implementations:
//! TCP for real multi-process runs, in-process channels for tests and
//! embedding without a network.

use std::collections::{HashMap, VecDeque};
use std::marker::PhantomData;
use std::net::{TcpListener, TcpStream, ToSocketAddrs};
use std::sync::mpsc::{channel, Receiver, Sender};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use distmat_vector::Scalar;

use crate::error::{Error, Result};

use super::wire::{read_frame, write_frame, Frame, Tag};
use super::{Rank, COORDINATOR};

/// Rank-to-rank messaging capability.
pub trait Transport<T: Scalar> {
    /// This process's rank.
    fn rank(&self) -> Rank;

    /// Total number of participating ranks.
    fn world_size(&self) -> usize;

    /// Send a frame to `to`.
    fn send(&mut self, to: Rank, frame: Frame<T>) -> Result<()>;

    /// Block until the expected frame arrives from `from`.
    fn recv(&mut self, from: Rank, tag: Tag) -> Result<Frame<T>>;

    /// Block until the next result frame arrives from any worker.
    fn recv_result(&mut self) -> Result<(Rank, Frame<T>)>;
}

//////////////
// Channels //
//////////////

/// In-process transport: every rank is a thread, frames move over mpsc
/// channels. Frames that arrive ahead of the one being waited for are
/// buffered, so arrival order is unconstrained.
pub struct ChannelTransport<T: Scalar> {
    rank: Rank,
    world_size: usize,
    inbox: Receiver<Frame<T>>,
    peers: HashMap<Rank, Sender<Frame<T>>>,
    pending: VecDeque<Frame<T>>,
}

/// Create a fully connected in-process cluster of `world_size` ranks.
///
/// The returned transports are ordered by rank; move each onto its own
/// thread.
pub fn channel_cluster<T: Scalar>(world_size: usize) -> Vec<ChannelTransport<T>> {
    assert!(world_size >= 1, "a cluster needs at least one rank");

    let (senders, inboxes): (Vec<_>, Vec<_>) =
        (0..world_size).map(|_| channel::<Frame<T>>()).unzip();

    inboxes
        .into_iter()
        .enumerate()
        .map(|(rank, inbox)| {
            let peers = senders
                .iter()
                .enumerate()
                .filter(|&(peer, _)| peer != rank)
                .map(|(peer, sender)| (peer as Rank, sender.clone()))
                .collect();
            ChannelTransport {
                rank: rank as Rank,
                world_size,
                inbox,
                peers,
                pending: VecDeque::new(),
            }
        })
        .collect()
}

impl<T: Scalar> ChannelTransport<T> {
    fn take_pending<F>(&mut self, matches: F) -> Option<Frame<T>>
    where
        F: Fn(&Frame<T>) -> bool,
    {
        let index = self.pending.iter().position(matches)?;
        self.pending.remove(index)
    }

    fn next_matching<F>(&mut self, matches: F) -> Result<Frame<T>>
    where
        F: Fn(&Frame<T>) -> bool,
    {
        if let Some(frame) = self.take_pending(&matches) {
            return Ok(frame);
        }
        loop {
            let frame = self.inbox.recv().map_err(|_| {
                Error::transport(format!("rank {}: all peers disconnected", self.rank))
            })?;
            if matches(&frame) {
                return Ok(frame);
            }
            self.pending.push_back(frame);
        }
    }
}

impl<T: Scalar> Transport<T> for ChannelTransport<T> {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn world_size(&self) -> usize {
        self.world_size
    }

    fn send(&mut self, to: Rank, frame: Frame<T>) -> Result<()> {
        let peer = self
            .peers
            .get(&to)
            .ok_or_else(|| Error::transport(format!("unknown destination rank {to}")))?;
        peer.send(frame)
            .map_err(|_| Error::transport(format!("rank {to} disconnected")))
    }

    fn recv(&mut self, from: Rank, tag: Tag) -> Result<Frame<T>> {
        self.next_matching(|frame| frame.source == from && frame.tag == tag)
    }

    fn recv_result(&mut self) -> Result<(Rank, Frame<T>)> {
        let frame = self.next_matching(|frame| frame.tag == Tag::Result)?;
        Ok((frame.source, frame))
    }
}

/////////
// TCP //
/////////

/// Blocking TCP transport.
///
/// Workers connect to the coordinator and identify themselves with a
/// little-endian rank; the coordinator answers with the world size. Each
/// process runs exactly one messaging thread, so plain blocking sockets
/// suffice.
#[derive(Debug)]
pub struct TcpTransport<T: Scalar> {
    rank: Rank,
    world_size: usize,
    peers: HashMap<Rank, TcpStream>,
    gather_order: VecDeque<Rank>,
    marker: PhantomData<fn() -> T>,
}

impl<T: Scalar> TcpTransport<T> {
    /// Bind `addr` and accept `world_size - 1` workers.
    pub fn coordinator(addr: impl ToSocketAddrs, world_size: usize) -> Result<Self> {
        let listener = TcpListener::bind(addr).map_err(|err| {
            Error::with_source(crate::ErrorKind::Transport, "failed to bind listener", err)
        })?;
        Self::coordinator_on(listener, world_size)
    }

    /// Accept `world_size - 1` workers on an already bound listener.
    pub fn coordinator_on(listener: TcpListener, world_size: usize) -> Result<Self> {
        if world_size < 2 {
            return Err(Error::transport(
                "a multi-process run needs a world size of at least 2",
            ));
        }

        let mut peers: HashMap<Rank, TcpStream> = HashMap::new();
        while peers.len() + 1 < world_size {
            let (mut stream, peer_addr) = listener.accept().map_err(|err| {
                Error::with_source(crate::ErrorKind::Transport, "failed to accept worker", err)
            })?;

            let rank = stream.read_u64::<LittleEndian>().map_err(|err| {
                Error::with_source(
                    crate::ErrorKind::Transport,
                    format!("failed to read hello from {peer_addr}"),
                    err,
                )
            })?;
            if rank == COORDINATOR || rank as usize >= world_size {
                return Err(Error::transport(format!(
                    "worker at {peer_addr} claims invalid rank {rank}"
                )));
            }
            if peers.contains_key(&rank) {
                return Err(Error::transport(format!(
                    "worker at {peer_addr} claims already-connected rank {rank}"
                )));
            }

            stream
                .write_u64::<LittleEndian>(world_size as u64)
                .map_err(|err| {
                    Error::with_source(
                        crate::ErrorKind::Transport,
                        format!("failed to greet rank {rank}"),
                        err,
                    )
                })?;
            tracing::debug!(rank, %peer_addr, "worker connected");
            peers.insert(rank, stream);
        }

        let mut gather_order: Vec<Rank> = peers.keys().copied().collect();
        gather_order.sort_unstable();

        Ok(Self {
            rank: COORDINATOR,
            world_size,
            peers,
            gather_order: gather_order.into(),
            marker: PhantomData,
        })
    }

    /// Connect to the coordinator at `addr` as `rank`.
    pub fn worker(addr: impl ToSocketAddrs, rank: Rank) -> Result<Self> {
        if rank == COORDINATOR {
            return Err(Error::transport("workers must use a rank of 1 or higher"));
        }

        let mut stream = TcpStream::connect(addr).map_err(|err| {
            Error::with_source(
                crate::ErrorKind::Transport,
                "failed to connect to coordinator",
                err,
            )
        })?;
        stream.write_u64::<LittleEndian>(rank).map_err(|err| {
            Error::with_source(crate::ErrorKind::Transport, "failed to send hello", err)
        })?;
        let world_size = stream.read_u64::<LittleEndian>().map_err(|err| {
            Error::with_source(
                crate::ErrorKind::Transport,
                "failed to read coordinator greeting",
                err,
            )
        })?;

        Ok(Self {
            rank,
            world_size: world_size as usize,
            peers: HashMap::from([(COORDINATOR, stream)]),
            gather_order: VecDeque::new(),
            marker: PhantomData,
        })
    }

    fn stream(&mut self, rank: Rank) -> Result<&mut TcpStream> {
        self.peers
            .get_mut(&rank)
            .ok_or_else(|| Error::transport(format!("no connection to rank {rank}")))
    }

    fn read_expected(&mut self, from: Rank, tag: Tag) -> Result<Frame<T>> {
        let stream = self.stream(from)?;
        let frame = read_frame::<T, _>(stream)?;
        if frame.tag != tag || frame.source != from {
            return Err(Error::transport(format!(
                "expected a {tag} frame from rank {from}, received a {} frame from rank {}",
                frame.tag, frame.source
            )));
        }
        Ok(frame)
    }
}

impl<T: Scalar> Transport<T> for TcpTransport<T> {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn world_size(&self) -> usize {
        self.world_size
    }

    fn send(&mut self, to: Rank, frame: Frame<T>) -> Result<()> {
        write_frame(self.stream(to)?, &frame)
    }

    fn recv(&mut self, from: Rank, tag: Tag) -> Result<Frame<T>> {
        self.read_expected(from, tag)
    }

    /// Worker sockets are drained in rank order; correctness does not
    /// depend on which worker finishes first because placement happens by
    /// the frame's originating rank.
    fn recv_result(&mut self) -> Result<(Rank, Frame<T>)> {
        let rank = self
            .gather_order
            .pop_front()
            .ok_or_else(|| Error::transport("every result block was already received"))?;
        let frame = self.read_expected(rank, Tag::Result)?;
        Ok((rank, frame))
    }
}

///////////
// Tests //
///////////
