//! presence-discover: LAN presence scanner.
//!
//! Loads a roster of people and their device MAC addresses, discovers
//! devices on the local network with arp-scan, nmap, or the system ARP
//! table (first that finds anything wins), and reports who is present.

pub mod arp_scan;
pub mod arp_table;
pub mod config;
pub mod diff;
pub mod discoverer;
pub mod error;
pub mod matcher;
pub mod monitor;
pub mod netdetect;
pub mod nmap;
pub mod roster;
pub mod scanner;
pub mod tracker;
