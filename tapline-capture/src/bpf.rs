//! Compiled BPF filter lifecycle
//!
//! A [`CompiledFilter`] is compiled against an activated session (or, with
//! [`CompiledFilter::compile_dead`], for a bare link type), attached to any
//! number of sessions with the same link type, and freed by its owner. Attaching does not transfer ownership: the session keeps its own
//! reference to the installed program, so freeing the filter afterwards
//! leaves capture unaffected. A freed filter rejects every further use with
//! [`Error::FilterClosed`].

use std::fmt;
use std::sync::Arc;
use tapline_core::{Error, LinkType, Result};
use tracing::{debug, info};

use crate::driver::{FilterProgram, NETMASK_UNKNOWN};
use crate::session::CaptureSession;

/// A filter program compiled for one link type
pub struct CompiledFilter {
    expression: String,
    optimize: bool,
    netmask: u32,
    link_type: LinkType,
    snaplen: i32,
    program: Option<Arc<dyn FilterProgram>>,
}

impl CompiledFilter {
    /// Compile `expression` for `session`'s link type
    ///
    /// Fails with [`Error::SessionClosed`] on a closed session and
    /// [`Error::FilterCompile`] when the driver rejects the expression.
    pub fn compile(
        session: &mut CaptureSession,
        expression: &str,
        optimize: bool,
        netmask: u32,
    ) -> Result<Self> {
        if session.is_closed() {
            return Err(Error::SessionClosed);
        }
        let (program, link_type) = session.compile_program(expression, optimize, netmask)?;
        debug!("Compiled filter '{}' for {}", expression, link_type);
        Ok(Self {
            expression: expression.to_string(),
            optimize,
            netmask,
            link_type,
            snaplen: session.snaplen()?,
            program: Some(program),
        })
    }

    /// Compile `expression` for `link_type` without an open capture
    ///
    /// The result can run in user space with [`matches`](Self::matches) or
    /// be attached to any session of the same link type.
    #[cfg(feature = "libpcap")]
    pub fn compile_dead(
        link_type: LinkType,
        snaplen: i32,
        expression: &str,
        optimize: bool,
        netmask: u32,
    ) -> Result<Self> {
        let program = crate::pcap_driver::compile_dead(link_type, expression, optimize, netmask)?;
        debug!("Compiled filter '{}' for {} without a capture", expression, link_type);
        Ok(Self {
            expression: expression.to_string(),
            optimize,
            netmask,
            link_type,
            snaplen,
            program: Some(program),
        })
    }

    #[cfg(not(feature = "libpcap"))]
    pub fn compile_dead(
        _link_type: LinkType,
        _snaplen: i32,
        _expression: &str,
        _optimize: bool,
        _netmask: u32,
    ) -> Result<Self> {
        Err(Error::PlatformUnsupported(
            "compiling without a capture requires the libpcap feature".to_string(),
        ))
    }

    /// Install this filter on `session`
    ///
    /// Frames the filter rejects are dropped by the driver and never reach
    /// the session's loop.
    pub fn attach(&self, session: &mut CaptureSession) -> Result<()> {
        let program = self.program()?;
        let session_link = session.datalink()?;
        if session_link != self.link_type {
            return Err(Error::FilterCompile(format!(
                "filter compiled for {} cannot be attached to a {} capture",
                self.link_type, session_link
            )));
        }
        session.install_program(Arc::clone(program))?;
        info!("BPF filter set on {}: {}", session.source(), self.expression);
        Ok(())
    }

    /// Run the program against one frame in user space
    pub fn matches(&self, frame: &[u8]) -> Result<bool> {
        Ok(self.program()?.matches(frame))
    }

    /// Release the compiled program
    pub fn free(&mut self) -> Result<()> {
        if self.program.take().is_none() {
            return Err(Error::FilterClosed);
        }
        debug!("Freed filter '{}'", self.expression);
        Ok(())
    }

    pub fn is_freed(&self) -> bool {
        self.program.is_none()
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn optimize(&self) -> bool {
        self.optimize
    }

    pub fn netmask(&self) -> u32 {
        self.netmask
    }

    pub fn link_type(&self) -> LinkType {
        self.link_type
    }

    /// Snapshot length the filter was compiled for
    pub fn snaplen(&self) -> i32 {
        self.snaplen
    }

    fn program(&self) -> Result<&Arc<dyn FilterProgram>> {
        self.program.as_ref().ok_or(Error::FilterClosed)
    }
}

impl fmt::Debug for CompiledFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledFilter")
            .field("expression", &self.expression)
            .field("optimize", &self.optimize)
            .field("link_type", &self.link_type)
            .field("snaplen", &self.snaplen)
            .field("freed", &self.is_freed())
            .finish()
    }
}

impl CaptureSession {
    /// Compile, attach and free `expression` in one call
    pub fn set_filter(&mut self, expression: &str, optimize: bool) -> Result<()> {
        let mut filter = CompiledFilter::compile(self, expression, optimize, NETMASK_UNKNOWN)?;
        filter.attach(self)?;
        filter.free()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::ReplayHandle;

    fn session(link_type: LinkType) -> CaptureSession {
        let handle = ReplayHandle::new(link_type)
            .define_filter("arp", |frame| frame.get(12..14) == Some(&[0x08, 0x06][..]));
        let mut session = CaptureSession::from_handle(handle);
        session.activate().unwrap();
        session
    }

    #[test]
    fn test_compile_on_closed_session() {
        let mut session = session(LinkType::Ethernet);
        session.close();
        let err = CompiledFilter::compile(&mut session, "arp", true, NETMASK_UNKNOWN).unwrap_err();
        assert!(matches!(err, Error::SessionClosed));
    }

    #[test]
    fn test_compile_syntax_error() {
        let mut session = session(LinkType::Ethernet);
        let err = CompiledFilter::compile(&mut session, "arp and and", true, NETMASK_UNKNOWN)
            .unwrap_err();
        assert!(matches!(err, Error::FilterCompile(_)));
    }

    #[test]
    fn test_compile_before_activation() {
        let mut session = CaptureSession::from_handle(ReplayHandle::new(LinkType::Ethernet));
        let err = CompiledFilter::compile(&mut session, "", true, NETMASK_UNKNOWN).unwrap_err();
        assert!(matches!(err, Error::InvalidState { .. }));
    }

    #[test]
    fn test_freed_filter_is_rejected() {
        let mut session = session(LinkType::Ethernet);
        let mut filter = CompiledFilter::compile(&mut session, "arp", true, NETMASK_UNKNOWN).unwrap();
        assert_eq!(filter.link_type(), LinkType::Ethernet);

        filter.free().unwrap();
        assert!(filter.is_freed());
        assert!(matches!(filter.attach(&mut session), Err(Error::FilterClosed)));
        assert!(matches!(filter.matches(&[0u8; 14]), Err(Error::FilterClosed)));
        assert!(matches!(filter.free(), Err(Error::FilterClosed)));
    }

    #[test]
    fn test_free_after_attach_keeps_filter_installed() {
        let mut session = session(LinkType::Ethernet);
        let mut filter = CompiledFilter::compile(&mut session, "arp", true, NETMASK_UNKNOWN).unwrap();
        filter.attach(&mut session).unwrap();
        filter.free().unwrap();
        assert_eq!(session.filter_expression(), Some("arp"));
    }

    #[test]
    fn test_link_type_mismatch() {
        let mut ethernet = session(LinkType::Ethernet);
        let mut raw = session(LinkType::Raw);
        let filter = CompiledFilter::compile(&mut ethernet, "arp", true, NETMASK_UNKNOWN).unwrap();
        assert!(matches!(filter.attach(&mut raw), Err(Error::FilterCompile(_))));
    }

    #[test]
    fn test_user_space_match() {
        let mut session = session(LinkType::Ethernet);
        let filter = CompiledFilter::compile(&mut session, "arp", false, NETMASK_UNKNOWN).unwrap();
        let mut frame = [0u8; 42];
        frame[12] = 0x08;
        frame[13] = 0x06;
        assert!(filter.matches(&frame).unwrap());
        frame[13] = 0x00;
        assert!(!filter.matches(&frame).unwrap());
    }

    #[test]
    fn test_compile_records_session_snaplen() {
        let handle = ReplayHandle::new(LinkType::Ethernet).define_filter("arp", |_| true);
        let mut session = CaptureSession::from_handle(handle);
        session.set_snaplen(96).unwrap();
        session.activate().unwrap();

        let filter = CompiledFilter::compile(&mut session, "arp", false, 0xffff_ff00).unwrap();
        assert_eq!(filter.snaplen(), 96);
        assert!(!filter.optimize());
        assert_eq!(filter.netmask(), 0xffff_ff00);
    }

    #[cfg(feature = "libpcap")]
    #[test]
    fn test_compile_dead() {
        let mut filter =
            CompiledFilter::compile_dead(LinkType::Ethernet, 1514, "arp", true, NETMASK_UNKNOWN).unwrap();
        assert_eq!(filter.link_type(), LinkType::Ethernet);
        assert_eq!(filter.snaplen(), 1514);

        let mut frame = [0u8; 42];
        frame[12] = 0x08;
        frame[13] = 0x06;
        assert!(filter.matches(&frame).unwrap());
        frame[13] = 0x00;
        assert!(!filter.matches(&frame).unwrap());

        let mut raw = session(LinkType::Raw);
        assert!(matches!(filter.attach(&mut raw), Err(Error::FilterCompile(_))));

        filter.free().unwrap();
        assert!(matches!(filter.matches(&frame), Err(Error::FilterClosed)));
    }

    #[cfg(feature = "libpcap")]
    #[test]
    fn test_compile_dead_syntax_error() {
        let err = CompiledFilter::compile_dead(LinkType::Ethernet, 65535, "arp and and", true, NETMASK_UNKNOWN)
            .unwrap_err();
        assert!(matches!(err, Error::FilterCompile(_)));
    }

    #[cfg(feature = "libpcap")]
    #[test]
    fn test_dead_filter_attaches_to_replay_session() {
        let filter =
            CompiledFilter::compile_dead(LinkType::Ethernet, 65535, "arp", true, NETMASK_UNKNOWN).unwrap();
        let mut arp = [0u8; 42];
        arp[12] = 0x08;
        arp[13] = 0x06;
        let ipv4 = {
            let mut frame = [0u8; 42];
            frame[12] = 0x08;
            frame
        };
        let mut session = CaptureSession::from_handle(ReplayHandle::offline(LinkType::Ethernet, [ipv4, arp]));
        session.activate().unwrap();
        filter.attach(&mut session).unwrap();

        let mut ether_types = Vec::new();
        session.run_loop(-1, |_, bytes| ether_types.push(bytes[13])).unwrap();
        assert_eq!(ether_types, vec![0x06]);
    }

    #[test]
    fn test_set_filter_shortcut() {
        let mut session = session(LinkType::Ethernet);
        session.set_filter("arp", true).unwrap();
        assert_eq!(session.filter_expression(), Some("arp"));
        assert!(session.set_filter("bogus", true).is_err());
        assert_eq!(session.filter_expression(), Some("arp"));
    }
}
