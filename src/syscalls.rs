//! x86_64 syscall names
//!
//! Lets filter descriptions name syscalls instead of spelling out numbers.

/// (name, number) pairs for x86_64, sorted by number
const X86_64_SYSCALLS: &[(&str, i32)] = &[
    ("read", 0),
    ("write", 1),
    ("open", 2),
    ("close", 3),
    ("stat", 4),
    ("fstat", 5),
    ("lstat", 6),
    ("poll", 7),
    ("lseek", 8),
    ("mmap", 9),
    ("mprotect", 10),
    ("munmap", 11),
    ("brk", 12),
    ("rt_sigaction", 13),
    ("rt_sigprocmask", 14),
    ("rt_sigreturn", 15),
    ("ioctl", 16),
    ("pread64", 17),
    ("pwrite64", 18),
    ("readv", 19),
    ("writev", 20),
    ("access", 21),
    ("pipe", 22),
    ("select", 23),
    ("sched_yield", 24),
    ("mremap", 25),
    ("msync", 26),
    ("mincore", 27),
    ("madvise", 28),
    ("shmget", 29),
    ("shmat", 30),
    ("shmctl", 31),
    ("dup", 32),
    ("dup2", 33),
    ("pause", 34),
    ("nanosleep", 35),
    ("getitimer", 36),
    ("alarm", 37),
    ("setitimer", 38),
    ("getpid", 39),
    ("sendfile", 40),
    ("socket", 41),
    ("connect", 42),
    ("accept", 43),
    ("sendto", 44),
    ("recvfrom", 45),
    ("sendmsg", 46),
    ("recvmsg", 47),
    ("shutdown", 48),
    ("bind", 49),
    ("listen", 50),
    ("getsockname", 51),
    ("getpeername", 52),
    ("socketpair", 53),
    ("setsockopt", 54),
    ("getsockopt", 55),
    ("clone", 56),
    ("fork", 57),
    ("vfork", 58),
    ("execve", 59),
    ("exit", 60),
    ("wait4", 61),
    ("kill", 62),
    ("uname", 63),
    ("fcntl", 72),
    ("flock", 73),
    ("fsync", 74),
    ("fdatasync", 75),
    ("truncate", 76),
    ("ftruncate", 77),
    ("getdents", 78),
    ("getcwd", 79),
    ("chdir", 80),
    ("fchdir", 81),
    ("rename", 82),
    ("mkdir", 83),
    ("rmdir", 84),
    ("creat", 85),
    ("link", 86),
    ("unlink", 87),
    ("symlink", 88),
    ("readlink", 89),
    ("chmod", 90),
    ("fchmod", 91),
    ("chown", 92),
    ("fchown", 93),
    ("lchown", 94),
    ("umask", 95),
    ("gettimeofday", 96),
    ("getrlimit", 97),
    ("getrusage", 98),
    ("sysinfo", 99),
    ("getuid", 102),
    ("getgid", 104),
    ("setuid", 105),
    ("setgid", 107),
    ("geteuid", 108),
    ("getegid", 109),
    ("setpgid", 110),
    ("getppid", 111),
    ("getpgrp", 112),
    ("setsid", 113),
    ("sigaltstack", 131),
    ("prctl", 157),
    ("arch_prctl", 158),
    ("gettid", 186),
    ("futex", 202),
    ("getdents64", 217),
    ("set_tid_address", 218),
    ("clock_gettime", 228),
    ("exit_group", 231),
    ("openat", 257),
    ("newfstatat", 262),
    ("set_robust_list", 273),
    ("getrandom", 318),
    ("statx", 332),
];

/// Number of an x86_64 syscall by name
pub fn syscall_number(name: &str) -> Option<i32> {
    X86_64_SYSCALLS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|&(_, num)| num)
}

/// Name of an x86_64 syscall, if it is in the table
pub fn syscall_name(num: i32) -> Option<&'static str> {
    X86_64_SYSCALLS
        .binary_search_by_key(&num, |&(_, n)| n)
        .ok()
        .map(|idx| X86_64_SYSCALLS[idx].0)
}
