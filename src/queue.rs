/// Fixed capacity FIFO on a circular buffer.
///
/// Pushing onto a full queue drops the new element and leaves the queued
/// ones untouched.
#[derive(Debug, Clone)]
pub struct RingQueue<T, const N: usize> {
    buff: [T; N],
    head: usize,
    tail: usize,
    count: usize,
}

impl<T: Copy, const N: usize> RingQueue<T, N> {
    /// Create an empty queue, `fill` is only used to initialize the storage
    pub const fn new(fill: T) -> Self {
        Self {
            buff: [fill; N],
            head: 0,
            tail: 0,
            count: 0,
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn clear(&mut self) {
        self.count = 0;
        self.tail = self.head;
    }

    /// Append `value`. Returns `false` if the queue was full and the value
    /// got dropped.
    pub fn push(&mut self, value: T) -> bool {
        if self.count >= N {
            return false;
        }
        self.buff[self.head] = value;
        self.head = (self.head + 1) % N;
        self.count += 1;
        true
    }

    pub fn pop(&mut self) -> Option<T> {
        if self.count == 0 {
            return None;
        }
        let value = self.buff[self.tail];
        self.tail = (self.tail + 1) % N;
        self.count -= 1;
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_full(&self) -> bool {
        self.count == N
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

impl<T: Copy + Default, const N: usize> Default for RingQueue<T, N> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
